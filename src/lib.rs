#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SMSC in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # SMSC DLR Poller
//!
//! Batch reconciliation of pending SMS delivery receipts.
//!
//! ## Overview
//!
//! Kannel stores a row in its `dlr` table for every message that awaits a
//! delivery receipt. For gateways that never push receipts, this crate polls
//! the SMSC status API instead: every cycle it fetches a bounded batch of
//! unresolved rows, asks the status API about each one through a fixed pool
//! of workers, reports final outcomes to each row's callback URL and marks
//! the row resolved.
//!
//! When the status API signals that the poller is being rate limited, the
//! next pause between cycles is extended.
//!
//! ## Module Organization
//!
//! - [`config`] - runtime settings and the Kannel routing table
//! - [`database`] - the `dlr` table as a record source and status sink
//! - [`client`] - status API and callback HTTP clients
//! - [`processor`] - per-record decision logic
//! - [`dispatcher`] - per-cycle worker pool
//! - [`backoff`] - shared throttling flag and pause policy
//! - [`cycle`] - the fetch/dispatch/sleep loop
//! - [`logging`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smsc_dlr_poller::backoff::{BackoffState, PausePolicy};
//! use smsc_dlr_poller::client::{build_http_client, CallbackClient, StatusOracleClient};
//! use smsc_dlr_poller::config::RoutingTable;
//! use smsc_dlr_poller::cycle::Poller;
//! use smsc_dlr_poller::database::{DatabaseConnection, DlrStore, PgDlrStore};
//! use smsc_dlr_poller::dispatcher::WorkerPool;
//! use smsc_dlr_poller::processor::RecordProcessor;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let routing = Arc::new(RoutingTable::load("/etc/kannel/kannel.conf")?);
//! let db = DatabaseConnection::connect(routing.storage()?, 12).await?;
//! let store: Arc<dyn DlrStore> = Arc::new(PgDlrStore::new(db.pool().clone()));
//!
//! let http = build_http_client(Duration::from_secs(30))?;
//! let backoff = Arc::new(BackoffState::new());
//! let processor = RecordProcessor::new(
//!     routing,
//!     StatusOracleClient::new("http://smsc.ru/sys/status.php", http.clone())?,
//!     CallbackClient::new(http),
//!     store.clone(),
//!     backoff.clone(),
//! );
//!
//! let mut poller = Poller::new(
//!     store,
//!     WorkerPool::new(10, Arc::new(processor)),
//!     backoff,
//!     PausePolicy::new(Duration::from_secs(60), Duration::from_secs(600)),
//!     1000,
//! );
//! let summary = poller.run_cycle().await?;
//! println!("processed {} records", summary.report.dispatched);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod models;
pub mod processor;

pub use backoff::{BackoffState, PausePolicy};
pub use config::{ConfigOverrides, PollerConfig, RoutingTable, UnroutablePolicy};
pub use cycle::{CycleState, CycleSummary, Poller};
pub use database::{DlrStore, InMemoryDlrStore, PgDlrStore};
pub use dispatcher::{CycleReport, Dispatched, WorkerPool};
pub use error::{PollerError, Result};
pub use models::{PendingRecord, StatusDecision, StatusResult};
pub use processor::{ProcessOutcome, RecordHandler, RecordProcessor};
