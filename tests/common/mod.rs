use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use updown::engine::SettlementEngine;
use updown::models::{Direction, NewPosition, Outcome, Position};
use updown::oracle::{OracleError, PriceOracle};
use updown::store::memory::{MemoryConfigStore, MemoryLedger, MemoryPositionStore};
use updown::store::{BalanceLedger, PositionStore, TrySettle};

/// Scripted price feed: per-symbol prices set by the test, with a switch
/// to simulate the feed being down.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    prices: Arc<Mutex<HashMap<String, Decimal>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().await.insert(symbol.to_string(), price);
    }

    /// Remove the symbol's price so the next fetch fails like a dead feed.
    pub async fn fail(&self, symbol: &str) {
        self.prices.lock().await.remove(symbol);
    }
}

#[async_trait]
impl PriceOracle for ScriptedOracle {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, OracleError> {
        self.prices
            .lock()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| OracleError::Unexpected(format!("feed down for {symbol}")))
    }
}

/// Ledger whose delta writes can be switched off, behaving like a store
/// that is down at exactly the wrong moment.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FlakyLedger {
    inner: MemoryLedger,
    fail_deltas: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deltas(&self, fail: bool) {
        self.fail_deltas.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BalanceLedger for FlakyLedger {
    async fn apply_delta(&self, user_id: Uuid, delta: Decimal) -> anyhow::Result<()> {
        if self.fail_deltas.load(Ordering::SeqCst) {
            anyhow::bail!("ledger unavailable");
        }
        self.inner.apply_delta(user_id, delta).await
    }

    async fn try_debit(&self, user_id: Uuid, amount: Decimal) -> anyhow::Result<bool> {
        self.inner.try_debit(user_id, amount).await
    }

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Decimal> {
        self.inner.get(user_id).await
    }
}

/// Position store whose inserts can be switched off while reads and the
/// conditional settle write keep working.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FlakyPositionStore {
    inner: MemoryPositionStore,
    fail_creates: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlakyPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositionStore for FlakyPositionStore {
    async fn create(&self, new: NewPosition) -> anyhow::Result<Position> {
        if self.fail_creates.load(Ordering::SeqCst) {
            anyhow::bail!("position store unavailable");
        }
        self.inner.create(new).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        self.inner.get(id).await
    }

    async fn list_expired_unsettled(
        &self,
        as_of: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> anyhow::Result<Vec<Position>> {
        self.inner.list_expired_unsettled(as_of, owner).await
    }

    async fn list_for_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Position>> {
        self.inner.list_for_owner(owner).await
    }

    async fn try_settle(
        &self,
        id: Uuid,
        close_price: Decimal,
        outcome: Outcome,
        profit_loss: Decimal,
        settled_at: DateTime<Utc>,
    ) -> anyhow::Result<TrySettle> {
        self.inner
            .try_settle(id, close_price, outcome, profit_loss, settled_at)
            .await
    }
}

pub struct TestWorld {
    pub engine: Arc<SettlementEngine>,
    pub positions: MemoryPositionStore,
    pub ledger: MemoryLedger,
    pub configs: MemoryConfigStore,
    pub oracle: ScriptedOracle,
}

pub const SYMBOL: &str = "BTCUSDT";

/// Engine over in-memory stores, with BTCUSDT active at 10% payout.
#[allow(dead_code)]
pub async fn setup() -> TestWorld {
    let positions = MemoryPositionStore::new();
    let ledger = MemoryLedger::new();
    let configs = MemoryConfigStore::new();
    let oracle = ScriptedOracle::new();

    configs.upsert(SYMBOL, Some(Decimal::TEN), true).await;

    let engine = Arc::new(SettlementEngine::new(
        Arc::new(positions.clone()),
        Arc::new(ledger.clone()),
        Arc::new(configs.clone()),
        Arc::new(oracle.clone()),
    ));

    TestWorld {
        engine,
        positions,
        ledger,
        configs,
        oracle,
    }
}

/// Insert a position whose duration already elapsed `expired_for_secs` ago,
/// with a controlled entry price. Bypasses the open workflow so tests pin
/// the entry price without waiting out a real duration.
#[allow(dead_code)]
pub async fn seed_expired_position(
    world: &TestWorld,
    owner_id: Uuid,
    direction: Direction,
    stake: Decimal,
    entry_price: Decimal,
    expired_for_secs: i64,
) -> Position {
    seed_expired_on(
        &world.positions,
        owner_id,
        direction,
        stake,
        entry_price,
        expired_for_secs,
    )
    .await
}

/// Same as `seed_expired_position` but against any position store.
#[allow(dead_code)]
pub async fn seed_expired_on(
    positions: &dyn PositionStore,
    owner_id: Uuid,
    direction: Direction,
    stake: Decimal,
    entry_price: Decimal,
    expired_for_secs: i64,
) -> Position {
    let duration_secs = 30;
    positions
        .create(NewPosition {
            owner_id,
            symbol: SYMBOL.into(),
            direction,
            stake,
            entry_price,
            opened_at: Utc::now() - Duration::seconds(duration_secs + expired_for_secs),
            duration_secs,
        })
        .await
        .expect("seed position")
}
