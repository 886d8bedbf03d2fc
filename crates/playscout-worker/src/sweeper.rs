//! Reconciliation loop over persisted retry jobs.
//!
//! In-process waiters handle retries while the process stays up. The sweeper
//! dispatches jobs that nobody is waiting on any more: jobs whose waiter was
//! drained at shutdown, lost in a crash, or never started.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::AnalysisOrchestrator;

pub const DEFAULT_SWEEP_BATCH: i64 = 100;

pub struct RetrySweeper {
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetrySweeper {
    /// Start sweeping every `interval`. A zero interval disables the loop.
    pub fn start(orchestrator: AnalysisOrchestrator, interval: Duration, batch_size: i64) -> Self {
        let shutdown = CancellationToken::new();

        let handle = if interval.is_zero() {
            tracing::info!("Retry sweeper disabled");
            None
        } else {
            let stop = shutdown.clone();
            Some(tokio::spawn(async move {
                Self::sweep_loop(orchestrator, interval, batch_size, stop).await;
            }))
        };

        Self {
            shutdown,
            handle: Mutex::new(handle),
        }
    }

    async fn sweep_loop(
        orchestrator: AnalysisOrchestrator,
        period: Duration,
        batch_size: i64,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            interval_secs = period.as_secs(),
            batch_size,
            "Retry sweeper started"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = orchestrator.dispatch_due_retries(Utc::now(), batch_size).await {
                        tracing::error!(error = %e, "Retry sweep failed");
                    }
                }
            }
        }

        tracing::info!("Retry sweeper stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Stop the loop and wait for the current pass to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Retry sweeper task ended abnormally");
            }
        }
    }
}
