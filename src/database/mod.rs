//! # Database Operations
//!
//! The poller touches storage through two operations only: streaming the
//! unresolved rows of the `dlr` table and setting a row's final status.
//! Both live behind the [`DlrStore`] trait so the worker pool can be driven
//! by Postgres in production and by [`InMemoryDlrStore`] in tests.
//!
//! ## Key Components
//!
//! - [`connection`] - pool creation from the routing table's storage profile
//! - [`store`] - the [`DlrStore`] trait and its Postgres implementation
//! - [`memory`] - an in-process store with the same ordering and filtering

pub mod connection;
pub mod memory;
pub mod store;

pub use connection::DatabaseConnection;
pub use memory::InMemoryDlrStore;
pub use store::{DlrStore, PgDlrStore};
