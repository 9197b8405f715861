//! # Outbound HTTP
//!
//! Two clients share one `reqwest::Client` (and its connection pool):
//!
//! - [`StatusOracleClient`] asks the SMSC status API for a message's outcome
//! - [`CallbackClient`] reports the outcome to the record's own callback URL

pub mod callback;
pub mod oracle;

use crate::error::{PollerError, Result};
use std::time::Duration;

pub use callback::{render_callback_url, CallbackClient};
pub use oracle::StatusOracleClient;

/// Build the HTTP client used for both the status API and callbacks.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("smsc-dlr-poller/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PollerError::configuration(format!("failed to build HTTP client: {e}")))
}
