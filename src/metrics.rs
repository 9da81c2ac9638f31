use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("positions_opened_total").absolute(0);
    counter!("positions_settled_total").absolute(0);
    counter!("wagers_won_total").absolute(0);
    counter!("wagers_lost_total").absolute(0);
    counter!("settle_already_settled").absolute(0);
    counter!("settle_races_lost").absolute(0);
    counter!("settle_config_blocked").absolute(0);
    counter!("settle_oracle_failures").absolute(0);
    counter!("settle_credit_failures").absolute(0);
    counter!("open_refund_failures").absolute(0);
    counter!("sweep_positions_processed").absolute(0);

    // Pre-register gauges at zero.
    gauge!("open_positions").set(0.0);

    handle
}
