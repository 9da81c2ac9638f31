pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{NewPosition, Outcome, PayoutConfig, Position};

/// Result of the conditional settle write.
///
/// `Applied` is the only variant carrying the settled row, so the balance
/// credit path is only reachable by winning the compare-and-swap. A caller
/// holding `LostRace` has nothing to pay out with.
#[derive(Debug)]
pub enum TrySettle {
    Applied(Position),
    LostRace,
}

/// Position persistence. The only writer after `create` is the settlement
/// engine, through `try_settle`.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn create(&self, new: NewPosition) -> anyhow::Result<Position>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>>;

    /// All positions with status pending/running and `expires_at <= as_of`,
    /// optionally scoped to one owner. Schedulers use this to find
    /// settlement candidates.
    async fn list_expired_unsettled(
        &self,
        as_of: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> anyhow::Result<Vec<Position>>;

    async fn list_for_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Position>>;

    /// Conditional write: applies only if the position is still unsettled,
    /// atomically setting status=settled plus the four result fields.
    /// This single primitive is what makes settlement idempotent under
    /// concurrent callers.
    async fn try_settle(
        &self,
        id: Uuid,
        close_price: Decimal,
        outcome: Outcome,
        profit_loss: Decimal,
        settled_at: DateTime<Utc>,
    ) -> anyhow::Result<TrySettle>;
}

/// One non-negative balance per user. The store owns atomicity: callers
/// never read a snapshot and write it back, and no "set balance" operation
/// exists.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Atomically add `delta` (signed) to the user's balance.
    async fn apply_delta(&self, user_id: Uuid, delta: Decimal) -> anyhow::Result<()>;

    /// Atomically debit `amount` if the balance covers it. Returns false
    /// when insufficient. Used only by the open-side workflow; settlement
    /// never re-checks sufficiency.
    async fn try_debit(&self, user_id: Uuid, amount: Decimal) -> anyhow::Result<bool>;

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Decimal>;
}

/// Per-symbol payout configuration.
#[async_trait]
pub trait PayoutConfigStore: Send + Sync {
    async fn get_config(&self, symbol: &str) -> anyhow::Result<Option<PayoutConfig>>;
}
