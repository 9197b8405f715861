//! # Worker Pool Dispatcher
//!
//! Fans one cycle's records out to a fixed number of workers and waits for
//! all of them. The pool lives for exactly one [`WorkerPool::dispatch`] call:
//!
//! - a bounded channel with room for one record per worker
//! - `worker_count` tasks sharing the receiver, each handling one record at a
//!   time, so at most `worker_count` records are in flight
//! - the caller's stream is forwarded into the channel as rows arrive, then
//!   the channel is closed
//! - every worker is joined before the call returns
//!
//! Workers keep their own tallies and hand them back when they exit, so the
//! pool shares no counters between tasks.

use crate::error::{PollerError, Result};
use crate::models::PendingRecord;
use crate::processor::{ProcessOutcome, RecordHandler};
use futures::{Stream, StreamExt};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

/// Tally of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records handed to the workers
    pub dispatched: usize,
    pub resolved: usize,
    pub rejected: usize,
    pub throttled: usize,
    pub pending: usize,
    pub abandoned: usize,
    pub callback_failed: usize,
    pub unroutable: usize,
    pub store_failed: usize,
}

impl CycleReport {
    pub fn record(&mut self, outcome: ProcessOutcome) {
        let slot = match outcome {
            ProcessOutcome::Resolved { .. } => &mut self.resolved,
            ProcessOutcome::Rejected => &mut self.rejected,
            ProcessOutcome::Throttled => &mut self.throttled,
            ProcessOutcome::Pending => &mut self.pending,
            ProcessOutcome::Abandoned => &mut self.abandoned,
            ProcessOutcome::CallbackFailed => &mut self.callback_failed,
            ProcessOutcome::Unroutable | ProcessOutcome::UnroutableFailed => &mut self.unroutable,
            ProcessOutcome::StoreFailed => &mut self.store_failed,
        };
        *slot += 1;
    }

    fn merge(&mut self, other: &CycleReport) {
        self.resolved += other.resolved;
        self.rejected += other.rejected;
        self.throttled += other.throttled;
        self.pending += other.pending;
        self.abandoned += other.abandoned;
        self.callback_failed += other.callback_failed;
        self.unroutable += other.unroutable;
        self.store_failed += other.store_failed;
    }

    /// Records whose processing ran to completion.
    pub fn processed(&self) -> usize {
        self.resolved
            + self.rejected
            + self.throttled
            + self.pending
            + self.abandoned
            + self.callback_failed
            + self.unroutable
            + self.store_failed
    }
}

/// Tally of one dispatch together with the storage error that cut the fetch
/// short, if any.
#[derive(Debug)]
pub struct Dispatched {
    pub report: CycleReport,
    pub fetch_error: Option<PollerError>,
}

pub struct WorkerPool<H: RecordHandler> {
    worker_count: usize,
    handler: Arc<H>,
}

impl<H: RecordHandler> WorkerPool<H> {
    pub fn new(worker_count: usize, handler: Arc<H>) -> Self {
        Self {
            worker_count: worker_count.max(1),
            handler,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Process every record of `records` and return once all workers have
    /// finished.
    ///
    /// A stream error stops production; records already queued are still
    /// processed and the error is handed back in [`Dispatched::fetch_error`]
    /// next to the tally of what did run. A worker panic is returned as
    /// [`PollerError::WorkerPanicked`] after the barrier.
    pub async fn dispatch<S>(&self, records: S) -> Result<Dispatched>
    where
        S: Stream<Item = Result<PendingRecord>> + Send,
    {
        let (tx, rx) = mpsc::channel::<PendingRecord>(self.worker_count);
        let rx = Arc::new(Mutex::new(rx));

        let workers: Vec<JoinHandle<CycleReport>> = (0..self.worker_count)
            .map(|worker_id| {
                tokio::spawn(
                    worker_loop(rx.clone(), self.handler.clone())
                        .instrument(info_span!("dlr_worker", worker = worker_id)),
                )
            })
            .collect();
        drop(rx);

        let mut records = std::pin::pin!(records);
        let mut dispatched = 0usize;
        let mut fetch_error = None;

        while let Some(item) = records.next().await {
            match item {
                Ok(record) => {
                    if tx.send(record).await.is_err() {
                        error!("All workers exited, stopping dispatch");
                        break;
                    }
                    dispatched += 1;
                }
                Err(e) => {
                    error!(error = %e, dispatched, "Fetching pending records failed");
                    fetch_error = Some(e);
                    break;
                }
            }
        }
        drop(tx);

        let mut report = CycleReport {
            dispatched,
            ..Default::default()
        };
        let mut worker_failure = None;

        for (worker_id, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(worker_report) => report.merge(&worker_report),
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        "worker task cancelled".to_string()
                    };
                    error!(worker = worker_id, panic = %message, "Worker task failed");
                    if worker_failure.is_none() {
                        worker_failure = Some(PollerError::WorkerPanicked { worker_id, message });
                    }
                }
            }
        }

        debug!(?report, "Dispatch barrier reached");

        if let Some(err) = worker_failure {
            return Err(err);
        }
        Ok(Dispatched {
            report,
            fetch_error,
        })
    }
}

async fn worker_loop<H: RecordHandler>(
    rx: Arc<Mutex<mpsc::Receiver<PendingRecord>>>,
    handler: Arc<H>,
) -> CycleReport {
    let mut report = CycleReport::default();
    loop {
        let record = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let Some(record) = record else { break };

        let outcome = handler.handle(record).await;
        report.record(outcome);
    }
    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
