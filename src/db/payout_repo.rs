use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::PayoutConfig;
use crate::store::PayoutConfigStore;

/// Postgres-backed payout config store. Rows are operator-managed; this
/// side only reads them.
#[derive(Clone)]
pub struct PgPayoutConfigStore {
    pool: PgPool,
}

impl PgPayoutConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayoutConfigStore for PgPayoutConfigStore {
    async fn get_config(&self, symbol: &str) -> anyhow::Result<Option<PayoutConfig>> {
        let config = sqlx::query_as::<_, PayoutConfig>(
            "SELECT * FROM payout_configs WHERE symbol = $1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }
}
