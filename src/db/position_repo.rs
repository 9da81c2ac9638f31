use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPosition, Outcome, Position};
use crate::store::{PositionStore, TrySettle};

/// Postgres-backed position store.
#[derive(Clone)]
pub struct PgPositionStore {
    pool: PgPool,
}

impl PgPositionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionStore for PgPositionStore {
    async fn create(&self, new: NewPosition) -> anyhow::Result<Position> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            INSERT INTO positions
                (owner_id, symbol, direction, stake, entry_price,
                 opened_at, duration_secs, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'running')
            RETURNING *
            "#,
        )
        .bind(new.owner_id)
        .bind(&new.symbol)
        .bind(new.direction)
        .bind(new.stake)
        .bind(new.entry_price)
        .bind(new.opened_at)
        .bind(new.duration_secs)
        .bind(new.expires_at())
        .fetch_one(&self.pool)
        .await?;

        Ok(position)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>("SELECT * FROM positions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(position)
    }

    async fn list_expired_unsettled(
        &self,
        as_of: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> anyhow::Result<Vec<Position>> {
        let positions = match owner {
            Some(owner_id) => {
                sqlx::query_as::<_, Position>(
                    r#"
                    SELECT * FROM positions
                    WHERE status IN ('pending', 'running')
                      AND expires_at <= $1
                      AND owner_id = $2
                    ORDER BY expires_at
                    "#,
                )
                .bind(as_of)
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Position>(
                    r#"
                    SELECT * FROM positions
                    WHERE status IN ('pending', 'running')
                      AND expires_at <= $1
                    ORDER BY expires_at
                    "#,
                )
                .bind(as_of)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(positions)
    }

    async fn list_for_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT * FROM positions WHERE owner_id = $1 ORDER BY opened_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    /// Compare-and-swap on status. The WHERE clause only matches an
    /// unsettled row, so under concurrent callers exactly one UPDATE
    /// returns a row; everyone else gets `LostRace`.
    async fn try_settle(
        &self,
        id: Uuid,
        close_price: Decimal,
        outcome: Outcome,
        profit_loss: Decimal,
        settled_at: DateTime<Utc>,
    ) -> anyhow::Result<TrySettle> {
        let settled = sqlx::query_as::<_, Position>(
            r#"
            UPDATE positions
            SET status = 'settled',
                close_price = $2,
                outcome = $3,
                profit_loss = $4,
                settled_at = $5
            WHERE id = $1
              AND status IN ('pending', 'running')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(close_price)
        .bind(outcome)
        .bind(profit_loss)
        .bind(settled_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match settled {
            Some(position) => TrySettle::Applied(position),
            None => TrySettle::LostRace,
        })
    }
}
