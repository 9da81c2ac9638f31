use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use metrics::counter;
use tokio::time::{interval, Duration};

use crate::engine::{SettleError, SettleOutcome, SettlementEngine};

/// Counts from one sweep pass, for logs and the sweep's observability
/// contract (its only output is "how many positions were processed").
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub candidates: usize,
    pub settled: usize,
    pub already_settled: usize,
    pub lost_races: usize,
    /// Config or price feed unavailable — retried on the next pass.
    pub deferred: usize,
    pub failed: usize,
}

/// One sweep over every expired unsettled position system-wide.
///
/// Candidates are settled fan-out, one task each, so a slow price fetch or
/// a failing symbol never blocks the rest of the sweep. The grace window
/// keeps the sweep off positions whose expiry is within clock-skew range;
/// it is a scheduler courtesy, not an engine requirement.
pub async fn sweep_once(
    engine: &SettlementEngine,
    grace: chrono::Duration,
) -> anyhow::Result<SweepStats> {
    let as_of = Utc::now() - grace;
    let candidates = engine.positions().list_expired_unsettled(as_of, None).await?;

    let mut stats = SweepStats {
        candidates: candidates.len(),
        ..SweepStats::default()
    };

    let tasks: Vec<_> = candidates
        .into_iter()
        .map(|position| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.settle(position.id).await })
        })
        .collect();

    for joined in join_all(tasks).await {
        match joined {
            Ok(Ok(SettleOutcome::Settled(_))) => stats.settled += 1,
            Ok(Ok(SettleOutcome::AlreadySettled)) => stats.already_settled += 1,
            Ok(Ok(SettleOutcome::LostRace)) => stats.lost_races += 1,
            Ok(Err(SettleError::ConfigUnavailable { .. }))
            | Ok(Err(SettleError::PriceUnavailable { .. })) => stats.deferred += 1,
            Ok(Err(e)) => {
                stats.failed += 1;
                tracing::error!(error = %e, "Sweep: settlement attempt failed");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(error = %e, "Sweep: settlement task panicked");
            }
        }
    }

    Ok(stats)
}

/// The authoritative backstop: a fixed-period sweep that guarantees every
/// position eventually settles even if its owner never reconnects.
pub async fn run_settlement_sweeper(
    engine: Arc<SettlementEngine>,
    interval_secs: u64,
    grace_secs: i64,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    let grace = chrono::Duration::seconds(grace_secs);

    loop {
        ticker.tick().await;

        match sweep_once(&engine, grace).await {
            Ok(stats) if stats.candidates == 0 => {
                tracing::debug!("Sweep: no expired positions");
            }
            Ok(stats) => {
                counter!("sweep_positions_processed").increment(stats.candidates as u64);
                tracing::info!(
                    candidates = stats.candidates,
                    settled = stats.settled,
                    already_settled = stats.already_settled,
                    lost_races = stats.lost_races,
                    deferred = stats.deferred,
                    failed = stats.failed,
                    "Sweep pass complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep: failed to list expired positions");
            }
        }
    }
}
