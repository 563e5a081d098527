// Runs the CPU-bound analysis off the async runtime and relays its progress.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use pennant_core::{analyze_with_progress, AnalysisConfig, AnalysisReport, LeagueInput, SimulationProgress};

/// Shared flag that asks a running forecast to stop at the next wave boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Set `cancel` when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancelFlag) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current wave");
            cancel.cancel();
        }
    })
}

/// Run the full analysis on the blocking pool.
///
/// Progress is logged as each wave of chunks completes. If `cancel` is set
/// the run stops between waves and the error downcasts to
/// `AnalysisError::Aborted`.
pub async fn run_forecast(
    input: LeagueInput,
    config: AnalysisConfig,
    cancel: CancelFlag,
) -> Result<AnalysisReport> {
    let (progress_tx, mut progress_rx) = mpsc::channel::<SimulationProgress>(64);

    let worker = tokio::task::spawn_blocking(move || {
        analyze_with_progress(&input, &config, |progress| {
            // Progress is advisory; a full channel drops the update.
            let _ = progress_tx.try_send(progress);
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    });

    let reporter = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            info!(
                "simulated {}/{} trials ({:.0}%)",
                p.completed_trials,
                p.total_trials,
                p.fraction() * 100.0
            );
        }
    });

    let outcome = worker.await.context("analysis task failed to complete")?;
    // The sender lives in the worker closure, so the reporter ends once it is dropped.
    let _ = reporter.await;

    Ok(outcome?)
}
