use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::engine::{SettleOutcome, SettlementEngine};

/// One countdown tick for one owner: settle every expired position not yet
/// attempted this session. Returns how many were settled by this caller.
///
/// `attempted` is a process-local liveness hint so one session does not
/// hammer the engine with duplicate calls; correctness never depends on it
/// (other processes exist), and a deferred attempt is removed again so the
/// next tick retries it.
pub async fn countdown_tick(
    engine: &SettlementEngine,
    owner_id: Uuid,
    as_of: DateTime<Utc>,
    attempted: &mut HashSet<Uuid>,
) -> anyhow::Result<usize> {
    let expired = engine
        .positions()
        .list_expired_unsettled(as_of, Some(owner_id))
        .await?;

    let mut settled = 0;
    for position in expired {
        if !attempted.insert(position.id) {
            continue;
        }

        match engine.settle(position.id).await {
            Ok(SettleOutcome::Settled(_)) => settled += 1,
            Ok(_) => {}
            Err(e) => {
                // Transient or config failure: retry on a later tick.
                attempted.remove(&position.id);
                tracing::warn!(
                    position_id = %position.id,
                    owner_id = %owner_id,
                    error = %e,
                    "Countdown: settlement deferred"
                );
            }
        }
    }

    Ok(settled)
}

/// Per-session countdown loop: ~1s ticks over the session owner's
/// positions while the client is connected. Callers abort the task when
/// the session ends.
pub async fn run_session_countdown(engine: Arc<SettlementEngine>, owner_id: Uuid, grace_secs: i64) {
    let mut ticker = interval(Duration::from_secs(1));
    let grace = chrono::Duration::seconds(grace_secs);
    let mut attempted: HashSet<Uuid> = HashSet::new();

    loop {
        ticker.tick().await;

        if let Err(e) = countdown_tick(&engine, owner_id, Utc::now() - grace, &mut attempted).await
        {
            tracing::error!(owner_id = %owner_id, error = %e, "Countdown tick failed");
        }
    }
}

/// Visibility reconciliation: one owner-scoped pass run when a client
/// regains foreground, covering positions that expired while its countdown
/// loop was not running. Returns the number settled by this pass.
pub async fn reconcile_owner(
    engine: &SettlementEngine,
    owner_id: Uuid,
    grace_secs: i64,
) -> anyhow::Result<usize> {
    let as_of = Utc::now() - chrono::Duration::seconds(grace_secs);
    let expired = engine
        .positions()
        .list_expired_unsettled(as_of, Some(owner_id))
        .await?;

    let mut settled = 0;
    for position in expired {
        match engine.settle(position.id).await {
            Ok(SettleOutcome::Settled(_)) => settled += 1,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    position_id = %position.id,
                    owner_id = %owner_id,
                    error = %e,
                    "Reconcile: settlement deferred"
                );
            }
        }
    }

    Ok(settled)
}
