//! # Cycle Loop
//!
//! Drives the poller: fetch a batch, dispatch it through the worker pool,
//! consume the backoff flag, sleep, repeat. The loop alternates between two
//! states and has no terminal state other than shutdown:
//!
//! ```text
//!   Running --(dispatch barrier)--> Sleeping --(pause elapsed)--> Running
//! ```
//!
//! Shutdown is cooperative. Cancelling the token stops the loop before the
//! next cycle or interrupts the pause; a cycle already running completes
//! first, and the caller bounds that wait with its own grace period.

use crate::backoff::{BackoffState, PausePolicy};
use crate::database::DlrStore;
use crate::dispatcher::{CycleReport, Dispatched, WorkerPool};
use crate::error::Result;
use crate::processor::RecordHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Running,
    Sleeping,
}

/// Result of one fetch-dispatch-backoff iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub report: CycleReport,
    /// Throttling was detected during this cycle
    pub was_blocked: bool,
    pub next_pause: Duration,
    /// Storage error that cut the cycle short
    pub error: Option<String>,
}

pub struct Poller<H: RecordHandler> {
    store: Arc<dyn DlrStore>,
    pool: WorkerPool<H>,
    backoff: Arc<BackoffState>,
    policy: PausePolicy,
    limit: i64,
    cycles: u64,
}

impl<H: RecordHandler> Poller<H> {
    pub fn new(
        store: Arc<dyn DlrStore>,
        pool: WorkerPool<H>,
        backoff: Arc<BackoffState>,
        policy: PausePolicy,
        limit: i64,
    ) -> Self {
        Self {
            store,
            pool,
            backoff,
            policy,
            limit,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn backoff(&self) -> &Arc<BackoffState> {
        &self.backoff
    }

    /// Run one cycle and choose the pause that should follow it.
    ///
    /// A storage error that stops the fetch is reported in the summary
    /// along with the tally of records that were processed before it; only
    /// a panicking worker is returned as `Err`.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        self.cycles += 1;
        let cycle = self.cycles;
        info!(cycle, state = ?CycleState::Running, limit = self.limit, "Starting cycle");

        let dispatched = self
            .pool
            .dispatch(self.store.fetch_pending(self.limit))
            .await;

        // every worker has finished, so every raise() of this cycle is visible
        let was_blocked = self.backoff.consume_and_reset();
        let next_pause = self.policy.next_pause(was_blocked);

        let Dispatched {
            report,
            fetch_error,
        } = dispatched?;
        let error = fetch_error.map(|e| {
            error!(cycle, error = %e, processed = report.dispatched, "Cycle ended early");
            e.to_string()
        });

        info!(
            cycle,
            processed = report.dispatched,
            resolved = report.resolved,
            rejected = report.rejected,
            pending = report.pending,
            throttled = report.throttled,
            abandoned = report.abandoned,
            callback_failed = report.callback_failed,
            unroutable = report.unroutable,
            "Processed {} records",
            report.dispatched
        );
        if was_blocked {
            warn!(
                cycle,
                pause_secs = next_pause.as_secs(),
                "Status API blocked the poller temporarily, extending pause"
            );
        }

        Ok(CycleSummary {
            cycle,
            report,
            was_blocked,
            next_pause,
            error,
        })
    }

    /// Loop until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        while !shutdown.is_cancelled() {
            let summary = self.run_cycle().await?;

            info!(
                cycle = summary.cycle,
                state = ?CycleState::Sleeping,
                pause_secs = summary.next_pause.as_secs(),
                "Sleeping until next cycle"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(summary.next_pause) => {}
            }
        }

        info!(cycles = self.cycles, "Poller stopped");
        Ok(())
    }
}

/// Wait up to `grace` for `task` to finish. On expiry the task is aborted
/// and `None` is returned.
pub async fn join_within<T>(
    task: &mut JoinHandle<T>,
    grace: Duration,
) -> Option<std::result::Result<T, JoinError>> {
    match tokio::time::timeout(grace, &mut *task).await {
        Ok(joined) => Some(joined),
        Err(_) => {
            task.abort();
            None
        }
    }
}
