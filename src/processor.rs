//! # Record Processor
//!
//! Resolves one pending delivery receipt:
//!
//! 1. look up the gateway credentials for the record
//! 2. ask the status API for the message outcome
//! 3. act on the reply:
//!
//! | reply                         | action                                              |
//! |-------------------------------|-----------------------------------------------------|
//! | `error_code >= 4`             | raise the shared backoff flag, nothing else         |
//! | `error_code` in `1..=3`       | best-effort callback with status 2, store status 2  |
//! | `error_code == 0, status > 0` | callback with status and `SMSC-ERROR`, then store   |
//! | otherwise                     | leave the record for a later cycle                  |
//!
//! Failures are logged and end processing of the record; nothing here is
//! fatal to the poller. A record left unresolved is fetched again next cycle.

use crate::backoff::BackoffState;
use crate::client::{CallbackClient, StatusOracleClient};
use crate::config::{RoutingTable, UnroutablePolicy};
use crate::constants::STATUS_FAILED;
use crate::database::DlrStore;
use crate::models::{PendingRecord, StatusDecision};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How processing of one record ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessOutcome {
    /// No routing entry for the gateway; record untouched.
    Unroutable,
    /// No routing entry; failure status stored without a callback.
    UnroutableFailed,
    /// Status API unreachable or its reply unreadable.
    Abandoned,
    /// Status API signalled throttling.
    Throttled,
    /// Message rejected; failure status stored.
    Rejected,
    /// Final status delivered to the callback and stored.
    Resolved { status: i64 },
    /// Callback failed; record left for a later cycle.
    CallbackFailed,
    /// No outcome yet.
    Pending,
    /// The status update could not be written.
    StoreFailed,
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Unroutable => write!(f, "unroutable"),
            ProcessOutcome::UnroutableFailed => write!(f, "unroutable_failed"),
            ProcessOutcome::Abandoned => write!(f, "abandoned"),
            ProcessOutcome::Throttled => write!(f, "throttled"),
            ProcessOutcome::Rejected => write!(f, "rejected"),
            ProcessOutcome::Resolved { status } => write!(f, "resolved({status})"),
            ProcessOutcome::CallbackFailed => write!(f, "callback_failed"),
            ProcessOutcome::Pending => write!(f, "pending"),
            ProcessOutcome::StoreFailed => write!(f, "store_failed"),
        }
    }
}

/// Work performed by the dispatcher's workers for each record.
#[async_trait]
pub trait RecordHandler: Send + Sync + 'static {
    async fn handle(&self, record: PendingRecord) -> ProcessOutcome;
}

pub struct RecordProcessor {
    routing: Arc<RoutingTable>,
    oracle: StatusOracleClient,
    callbacks: CallbackClient,
    store: Arc<dyn DlrStore>,
    backoff: Arc<BackoffState>,
    unroutable_policy: UnroutablePolicy,
}

impl RecordProcessor {
    pub fn new(
        routing: Arc<RoutingTable>,
        oracle: StatusOracleClient,
        callbacks: CallbackClient,
        store: Arc<dyn DlrStore>,
        backoff: Arc<BackoffState>,
    ) -> Self {
        Self {
            routing,
            oracle,
            callbacks,
            store,
            backoff,
            unroutable_policy: UnroutablePolicy::default(),
        }
    }

    pub fn with_unroutable_policy(mut self, policy: UnroutablePolicy) -> Self {
        self.unroutable_policy = policy;
        self
    }

    #[instrument(
        skip_all,
        fields(record_id = record.id, external_id = record.external_id, gateway = %record.gateway_key)
    )]
    pub async fn process(&self, record: &PendingRecord) -> ProcessOutcome {
        let Some(profile) = self.routing.get(&record.gateway_key) else {
            return self.handle_unroutable(record).await;
        };

        let result = match self.oracle.query(profile, record).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Status query failed, retrying next cycle");
                return ProcessOutcome::Abandoned;
            }
        };

        match result.decision() {
            StatusDecision::Throttled => {
                warn!(
                    error_code = result.error_code,
                    error = %result.error,
                    "Status API is throttling requests"
                );
                self.backoff.raise();
                ProcessOutcome::Throttled
            }
            StatusDecision::Rejected => {
                info!(
                    error_code = result.error_code,
                    error = %result.error,
                    "Message rejected by gateway"
                );
                // best effort: the failure is stored whatever the callback does
                if let Err(e) = self
                    .callbacks
                    .notify(&record.callback_url_template, i64::from(STATUS_FAILED), None)
                    .await
                {
                    debug!(error = %e, "Failure callback not delivered");
                }
                self.store_status(record, STATUS_FAILED, ProcessOutcome::Rejected)
                    .await
            }
            StatusDecision::Delivered { status, err } => {
                // an unstorable status must not reach the callback
                let Ok(stored) = i32::try_from(status) else {
                    error!(status, "Status does not fit the status column");
                    return ProcessOutcome::StoreFailed;
                };
                if let Err(e) = self
                    .callbacks
                    .notify(&record.callback_url_template, status, Some(err))
                    .await
                {
                    warn!(error = %e, status, "Callback failed, retrying next cycle");
                    return ProcessOutcome::CallbackFailed;
                }
                self.store_status(record, stored, ProcessOutcome::Resolved { status })
                    .await
            }
            StatusDecision::Undecided => {
                debug!(status = result.status, "No final status yet");
                ProcessOutcome::Pending
            }
        }
    }

    async fn handle_unroutable(&self, record: &PendingRecord) -> ProcessOutcome {
        match self.unroutable_policy {
            UnroutablePolicy::Skip => {
                warn!("No routing entry for gateway, skipping record");
                ProcessOutcome::Unroutable
            }
            UnroutablePolicy::Fail => {
                warn!("No routing entry for gateway, marking record failed");
                self.store_status(record, STATUS_FAILED, ProcessOutcome::UnroutableFailed)
                    .await
            }
        }
    }

    async fn store_status(
        &self,
        record: &PendingRecord,
        status: i32,
        outcome: ProcessOutcome,
    ) -> ProcessOutcome {
        match self.store.set_status(record.id, status).await {
            Ok(()) => {
                info!(status, outcome = %outcome, "Record resolved");
                outcome
            }
            Err(e) => {
                error!(error = %e, status, "Failed to store record status");
                ProcessOutcome::StoreFailed
            }
        }
    }
}

#[async_trait]
impl RecordHandler for RecordProcessor {
    async fn handle(&self, record: PendingRecord) -> ProcessOutcome {
        self.process(&record).await
    }
}
