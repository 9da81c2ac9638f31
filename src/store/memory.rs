use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{NewPosition, Outcome, PayoutConfig, Position, PositionStatus};
use crate::store::{BalanceLedger, PayoutConfigStore, PositionStore, TrySettle};

/// In-memory position store. The settle path holds the lock across the
/// status check and the write, giving the same per-position atomicity the
/// Postgres conditional UPDATE provides.
#[derive(Clone, Default)]
pub struct MemoryPositionStore {
    inner: Arc<Mutex<HashMap<Uuid, Position>>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn create(&self, new: NewPosition) -> anyhow::Result<Position> {
        let position = Position {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            symbol: new.symbol.clone(),
            direction: new.direction,
            stake: new.stake,
            entry_price: new.entry_price,
            opened_at: new.opened_at,
            duration_secs: new.duration_secs,
            expires_at: new.expires_at(),
            status: PositionStatus::Running,
            close_price: None,
            outcome: None,
            profit_loss: None,
            settled_at: None,
        };
        let mut inner = self.inner.lock().await;
        inner.insert(position.id, position.clone());
        Ok(position)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        let inner = self.inner.lock().await;
        Ok(inner.get(&id).cloned())
    }

    async fn list_expired_unsettled(
        &self,
        as_of: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> anyhow::Result<Vec<Position>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Position> = inner
            .values()
            .filter(|p| p.status.is_unsettled() && p.expires_at <= as_of)
            .filter(|p| owner.map_or(true, |o| p.owner_id == o))
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.expires_at);
        Ok(rows)
    }

    async fn list_for_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Position>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Position> = inner
            .values()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(rows)
    }

    async fn try_settle(
        &self,
        id: Uuid,
        close_price: Decimal,
        outcome: Outcome,
        profit_loss: Decimal,
        settled_at: DateTime<Utc>,
    ) -> anyhow::Result<TrySettle> {
        let mut inner = self.inner.lock().await;
        let Some(position) = inner.get_mut(&id) else {
            return Ok(TrySettle::LostRace);
        };
        if !position.status.is_unsettled() {
            return Ok(TrySettle::LostRace);
        }
        position.status = PositionStatus::Settled;
        position.close_price = Some(close_price);
        position.outcome = Some(outcome);
        position.profit_loss = Some(profit_loss);
        position.settled_at = Some(settled_at);
        Ok(TrySettle::Applied(position.clone()))
    }
}

/// In-memory balance ledger, one entry per user. Deltas are applied under
/// a single lock so concurrent credits never lose an update.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<HashMap<Uuid, Decimal>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceLedger for MemoryLedger {
    async fn apply_delta(&self, user_id: Uuid, delta: Decimal) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(user_id).or_insert(Decimal::ZERO);
        *entry += delta;
        tracing::debug!(user_id = %user_id, delta = %delta, balance = %entry, "Ledger: delta applied");
        Ok(())
    }

    async fn try_debit(&self, user_id: Uuid, amount: Decimal) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(user_id).or_insert(Decimal::ZERO);
        if *entry < amount {
            tracing::warn!(
                user_id = %user_id,
                required = %amount,
                available = %entry,
                "Ledger: insufficient funds to debit"
            );
            return Ok(false);
        }
        *entry -= amount;
        Ok(true)
    }

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Decimal> {
        let inner = self.inner.lock().await;
        Ok(inner.get(&user_id).copied().unwrap_or(Decimal::ZERO))
    }
}

/// In-memory payout config store with mutators for operator-style changes.
#[derive(Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<Mutex<HashMap<String, PayoutConfig>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, symbol: &str, payout_pct: Option<Decimal>, active: bool) {
        let mut inner = self.inner.lock().await;
        inner.insert(
            symbol.to_string(),
            PayoutConfig {
                symbol: symbol.to_string(),
                payout_pct,
                active,
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn set_active(&self, symbol: &str, active: bool) {
        let mut inner = self.inner.lock().await;
        if let Some(config) = inner.get_mut(symbol) {
            config.active = active;
            config.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl PayoutConfigStore for MemoryConfigStore {
    async fn get_config(&self, symbol: &str) -> anyhow::Result<Option<PayoutConfig>> {
        let inner = self.inner.lock().await;
        Ok(inner.get(symbol).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn new_position(expires_in_secs: i64) -> NewPosition {
        NewPosition {
            owner_id: Uuid::new_v4(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Up,
            stake: Decimal::from(50),
            entry_price: Decimal::from(100),
            opened_at: Utc::now() - chrono::Duration::seconds(60),
            duration_secs: 60 + expires_in_secs,
        }
    }

    #[tokio::test]
    async fn try_settle_applies_once() {
        let store = MemoryPositionStore::new();
        let pos = store.create(new_position(-10)).await.unwrap();

        let first = store
            .try_settle(
                pos.id,
                Decimal::from(105),
                Outcome::Win,
                Decimal::from(5),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(first, TrySettle::Applied(_)));

        let second = store
            .try_settle(
                pos.id,
                Decimal::from(90),
                Outcome::Lose,
                Decimal::from(-5),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(second, TrySettle::LostRace));

        // The first write is the one that stuck.
        let settled = store.get(pos.id).await.unwrap().unwrap();
        assert_eq!(settled.status, PositionStatus::Settled);
        assert_eq!(settled.close_price, Some(Decimal::from(105)));
        assert_eq!(settled.outcome, Some(Outcome::Win));
    }

    #[tokio::test]
    async fn expired_listing_respects_as_of_and_owner() {
        let store = MemoryPositionStore::new();
        let expired = store.create(new_position(-10)).await.unwrap();
        let _live = store.create(new_position(120)).await.unwrap();

        let all = store
            .list_expired_unsettled(Utc::now(), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, expired.id);

        let other_owner = store
            .list_expired_unsettled(Utc::now(), Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(other_owner.is_empty());
    }

    #[tokio::test]
    async fn debit_fails_when_insufficient() {
        let ledger = MemoryLedger::new();
        let user = Uuid::new_v4();
        ledger.apply_delta(user, Decimal::from(100)).await.unwrap();

        assert!(ledger.try_debit(user, Decimal::from(60)).await.unwrap());
        assert!(!ledger.try_debit(user, Decimal::from(60)).await.unwrap());
        assert_eq!(ledger.get(user).await.unwrap(), Decimal::from(40));
    }
}
