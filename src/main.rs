use std::sync::Arc;

use updown::api::router::create_router;
use updown::config::AppConfig;
use updown::db;
use updown::engine::SettlementEngine;
use updown::metrics::init_metrics;
use updown::oracle::HttpPriceOracle;
use updown::services::sweeper::run_settlement_sweeper;
use updown::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let metrics_handle = init_metrics();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected, migrations applied");

    let positions = Arc::new(db::PgPositionStore::new(pool.clone()));
    let ledger = Arc::new(db::PgBalanceLedger::new(pool.clone()));
    let configs = Arc::new(db::PgPayoutConfigStore::new(pool));
    let oracle = Arc::new(HttpPriceOracle::new(
        reqwest::Client::new(),
        config.oracle_base_url.clone(),
    ));

    let engine = Arc::new(SettlementEngine::new(positions, ledger, configs, oracle));

    // Server sweep: the authoritative settlement backstop.
    let sweep_engine = engine.clone();
    let sweep_interval = config.sweep_interval_secs;
    let grace_secs = config.expiry_grace_secs;
    tokio::spawn(async move {
        run_settlement_sweeper(sweep_engine, sweep_interval, grace_secs).await;
    });
    tracing::info!(
        interval_secs = sweep_interval,
        grace_secs,
        "Settlement sweeper spawned"
    );

    let state = AppState {
        engine,
        config,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
