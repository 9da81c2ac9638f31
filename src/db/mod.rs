pub mod balance_repo;
pub mod payout_repo;
pub mod position_repo;

pub use balance_repo::PgBalanceLedger;
pub use payout_repo::PgPayoutConfigStore;
pub use position_repo::PgPositionStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
