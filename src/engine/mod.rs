use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Direction, NewPosition, Outcome, Position};
use crate::oracle::{OracleError, PriceOracle};
use crate::store::{BalanceLedger, PayoutConfigStore, PositionStore, TrySettle};

/// Terminal states of one `settle` attempt that completed without error.
#[derive(Debug)]
pub enum SettleOutcome {
    /// This caller won the conditional write and credited the owner.
    Settled(Position),
    /// The position was already settled when loaded — the common case when
    /// a slower scheduler arrives after a faster one.
    AlreadySettled,
    /// Another caller's conditional write landed between our load and our
    /// write. The winner pays out; we must not.
    LostRace,
}

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("position {0} not found")]
    NotFound(Uuid),

    /// Missing, inactive, or percentage-less payout config. Permanent until
    /// an operator fixes it; the position stays unsettled and is retried on
    /// every scheduler pass.
    #[error("payout config unavailable for {symbol}")]
    ConfigUnavailable { symbol: String },

    /// Transient price feed failure; retried on the next pass.
    #[error("price feed unavailable for {symbol}: {source}")]
    PriceUnavailable {
        symbol: String,
        #[source]
        source: OracleError,
    },

    /// The conditional write applied but the ledger credit failed. The
    /// position is settled and the store remains the source of truth;
    /// this is an invariant violation to alert on, never to retry blindly.
    #[error("balance credit failed for settled position {position_id}")]
    CreditFailed {
        position_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("invalid wager: {0}")]
    Invalid(&'static str),

    #[error("symbol {0} is not open for wagers")]
    SymbolUnavailable(String),

    #[error("price feed unavailable for {symbol}: {source}")]
    PriceUnavailable {
        symbol: String,
        #[source]
        source: OracleError,
    },

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Payout slice moved on settlement: stake × pct / 100.
fn payout_amount(stake: Decimal, payout_pct: Decimal) -> Decimal {
    stake * payout_pct / Decimal::from(100)
}

/// Orchestrates oracle, payout config, position store, and ledger to open
/// wagers and settle expired ones exactly once.
///
/// Any number of schedulers may call `settle` for the same position
/// concurrently; correctness rests entirely on the position store's
/// conditional write, not on anything held in this process.
#[derive(Clone)]
pub struct SettlementEngine {
    positions: Arc<dyn PositionStore>,
    ledger: Arc<dyn BalanceLedger>,
    configs: Arc<dyn PayoutConfigStore>,
    oracle: Arc<dyn PriceOracle>,
}

impl SettlementEngine {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        ledger: Arc<dyn BalanceLedger>,
        configs: Arc<dyn PayoutConfigStore>,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        Self {
            positions,
            ledger,
            configs,
            oracle,
        }
    }

    pub fn positions(&self) -> &Arc<dyn PositionStore> {
        &self.positions
    }

    pub fn ledger(&self) -> &Arc<dyn BalanceLedger> {
        &self.ledger
    }

    /// Open a wager: debit the stake, then insert the running position.
    /// The stake has left the balance before the position exists, so
    /// settlement only ever returns money.
    pub async fn open_position(
        &self,
        owner_id: Uuid,
        symbol: &str,
        direction: Direction,
        stake: Decimal,
        duration_secs: i64,
    ) -> Result<Position, OpenError> {
        if stake <= Decimal::ZERO {
            return Err(OpenError::Invalid("stake must be positive"));
        }
        if duration_secs <= 0 {
            return Err(OpenError::Invalid("duration must be positive"));
        }

        let config = self.configs.get_config(symbol).await?;
        if config.and_then(|c| c.usable_pct()).is_none() {
            return Err(OpenError::SymbolUnavailable(symbol.to_string()));
        }

        let entry_price =
            self.oracle
                .get_price(symbol)
                .await
                .map_err(|source| OpenError::PriceUnavailable {
                    symbol: symbol.to_string(),
                    source,
                })?;

        if !self.ledger.try_debit(owner_id, stake).await? {
            return Err(OpenError::InsufficientBalance);
        }

        let position = match self
            .positions
            .create(NewPosition {
                owner_id,
                symbol: symbol.to_string(),
                direction,
                stake,
                entry_price,
                opened_at: Utc::now(),
                duration_secs,
            })
            .await
        {
            Ok(position) => position,
            Err(source) => {
                // The stake already left the balance but no position row
                // exists; put the stake back before surfacing the failure.
                if let Err(refund_err) = self.ledger.apply_delta(owner_id, stake).await {
                    counter!("open_refund_failures").increment(1);
                    tracing::error!(
                        owner_id = %owner_id,
                        symbol = symbol,
                        stake = %stake,
                        create_error = %source,
                        error = %refund_err,
                        "INVARIANT: stake debited, position insert failed, and refund failed"
                    );
                }
                return Err(OpenError::Store(source));
            }
        };

        counter!("positions_opened_total").increment(1);
        gauge!("open_positions").increment(1.0);
        tracing::info!(
            position_id = %position.id,
            owner_id = %owner_id,
            symbol = symbol,
            direction = %direction,
            stake = %stake,
            entry_price = %entry_price,
            expires_at = %position.expires_at,
            "Position opened"
        );

        Ok(position)
    }

    /// Settle one expired position, idempotently.
    ///
    /// Everything before the conditional write is side-effect-free, so a
    /// failed attempt can be retried unboundedly. The ledger credit is
    /// gated behind winning that write and therefore runs at most once
    /// per position no matter how many callers race here.
    pub async fn settle(&self, position_id: Uuid) -> Result<SettleOutcome, SettleError> {
        let position = self
            .positions
            .get(position_id)
            .await?
            .ok_or(SettleError::NotFound(position_id))?;

        if !position.status.is_unsettled() {
            counter!("settle_already_settled").increment(1);
            return Ok(SettleOutcome::AlreadySettled);
        }

        let payout_pct = self
            .configs
            .get_config(&position.symbol)
            .await?
            .and_then(|c| c.usable_pct())
            .ok_or_else(|| {
                // Money is still owed on this position; keep it loud until
                // an operator restores the config.
                counter!("settle_config_blocked").increment(1);
                tracing::warn!(
                    position_id = %position.id,
                    symbol = %position.symbol,
                    "Settlement blocked: payout config missing, inactive, or without percentage"
                );
                SettleError::ConfigUnavailable {
                    symbol: position.symbol.clone(),
                }
            })?;

        let close_price =
            self.oracle
                .get_price(&position.symbol)
                .await
                .map_err(|source| {
                    counter!("settle_oracle_failures").increment(1);
                    tracing::warn!(
                        position_id = %position.id,
                        symbol = %position.symbol,
                        error = %source,
                        "Settlement deferred: price feed unavailable"
                    );
                    SettleError::PriceUnavailable {
                        symbol: position.symbol.clone(),
                        source,
                    }
                })?;

        let outcome = Outcome::decide(position.direction, position.entry_price, close_price);
        let payout = payout_amount(position.stake, payout_pct);
        let profit_loss = match outcome {
            Outcome::Win => payout,
            Outcome::Lose => -payout,
        };

        let settled = match self
            .positions
            .try_settle(position.id, close_price, outcome, profit_loss, Utc::now())
            .await?
        {
            TrySettle::Applied(settled) => settled,
            TrySettle::LostRace => {
                counter!("settle_races_lost").increment(1);
                tracing::debug!(
                    position_id = %position.id,
                    "Lost settlement race; winner pays out"
                );
                return Ok(SettleOutcome::LostRace);
            }
        };

        // Only reachable with the Applied row in hand: return the stake
        // plus/minus the payout slice.
        let credit = settled.stake + profit_loss;
        if let Err(source) = self.ledger.apply_delta(settled.owner_id, credit).await {
            counter!("settle_credit_failures").increment(1);
            tracing::error!(
                position_id = %settled.id,
                owner_id = %settled.owner_id,
                credit = %credit,
                error = %source,
                "INVARIANT: position settled but balance credit failed"
            );
            return Err(SettleError::CreditFailed {
                position_id: settled.id,
                source,
            });
        }

        counter!("positions_settled_total").increment(1);
        match outcome {
            Outcome::Win => counter!("wagers_won_total").increment(1),
            Outcome::Lose => counter!("wagers_lost_total").increment(1),
        }
        gauge!("open_positions").decrement(1.0);
        tracing::info!(
            position_id = %settled.id,
            owner_id = %settled.owner_id,
            symbol = %settled.symbol,
            direction = %settled.direction,
            entry_price = %settled.entry_price,
            close_price = %close_price,
            outcome = %outcome,
            profit_loss = %profit_loss,
            credited = %credit,
            "Position settled"
        );

        Ok(SettleOutcome::Settled(settled))
    }
}
