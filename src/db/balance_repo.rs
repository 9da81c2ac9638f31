use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::BalanceLedger;

/// Postgres-backed balance ledger. All mutation is a single UPDATE with
/// the arithmetic in SQL, so the database serializes concurrent deltas
/// and no caller ever writes back a stale snapshot.
#[derive(Clone)]
pub struct PgBalanceLedger {
    pool: PgPool,
}

impl PgBalanceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceLedger for PgBalanceLedger {
    async fn apply_delta(&self, user_id: Uuid, delta: Decimal) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
                SET balance = balances.balance + $2, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_debit(&self, user_id: Uuid, amount: Decimal) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Decimal> {
        let row: Option<(Decimal,)> =
            sqlx::query_as("SELECT balance FROM balances WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.0).unwrap_or(Decimal::ZERO))
    }
}
