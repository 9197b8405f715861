//! # Poller Constants
//!
//! Fixed values shared by the status client, the record processor and the
//! cycle loop.

/// Storage status of a record that has not been resolved yet.
pub const STATUS_PENDING: i32 = 0;

/// Status reported and stored when the status API rejects a message.
pub const STATUS_FAILED: i32 = 2;

/// `error_code` values at or above this mean the caller is being throttled.
pub const THROTTLE_ERROR_CODE: i64 = 4;

/// Header carrying the status API's `err` code on terminal callbacks.
pub const SMSC_ERROR_HEADER: &str = "SMSC-ERROR";

/// Response-format selector for a JSON status reply.
pub const STATUS_RESPONSE_FORMAT: &str = "3";

pub mod defaults {
    pub const CONF_PATH: &str = "/etc/kannel/kannel.conf";
    pub const WORKERS: usize = 10;
    pub const LIMIT: i64 = 1000;
    pub const PAUSE_SECONDS: u64 = 60;
    pub const BLOCKED_PAUSE_SECONDS: u64 = 600;
    pub const STATUS_URL: &str = "http://smsc.ru/sys/status.php";
    pub const HTTP_TIMEOUT_SECONDS: u64 = 30;
    pub const SHUTDOWN_GRACE_SECONDS: u64 = 30;
}

pub mod storage {
    pub const DEFAULT_HOST: &str = "localhost";
    pub const DEFAULT_PORT: &str = "5432";
    pub const DEFAULT_DATABASE: &str = "dlr";
}
