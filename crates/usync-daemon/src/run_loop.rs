//! Fixed-tick reconcile loop.
//!
//! One cycle per tick. A cycle always runs to completion; shutdown is only
//! observed between cycles. Aborted cycles wait for the next tick like any
//! other (no tight retry loop against a database that is down).

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use usync_runtime::{CycleError, CycleReport, Reconciler};

use crate::state::AppState;

/// Run cycles every `interval` until `shutdown` resolves. The first cycle
/// starts immediately. Returns the number of cycles run.
pub async fn run_reconcile_loop<F>(
    state: &AppState,
    reconciler: &Reconciler,
    interval: Duration,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    state.set_state("idle").await;
    info!(interval_secs = interval.as_secs(), "reconcile loop started");

    let mut cycles = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        state.set_state("reconciling").await;
        let outcome = reconciler.run_cycle().await;
        log_outcome(&outcome);
        state.record_cycle(&outcome).await;
        state.set_state("idle").await;
        cycles += 1;
    }

    state.set_state("stopping").await;
    info!(cycles, "reconcile loop stopped");
    cycles
}

fn log_outcome(outcome: &Result<CycleReport, CycleError>) {
    match outcome {
        Ok(report) if report.is_clean() => {}
        Ok(report) => {
            let s = report.summary();
            warn!(
                cycle_id = %s.cycle_id,
                failed = s.failed,
                counter_failures = s.counter_failures,
                lost_traffic = s.lost_traffic,
                "cycle finished with failures; retrying next tick"
            );
        }
        Err(err) => {
            error!(error = %err, "cycle failed; waiting for next tick");
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested; finishing current cycle");
}
