pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod oracle;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::SettlementEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
