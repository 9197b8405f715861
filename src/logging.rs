//! # Structured Logging Module
//!
//! Console logging for the poller, plus a JSON log file per process when a
//! log directory is configured.

use chrono::Utc;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Environment variable naming the deployment environment.
pub const ENVIRONMENT_VAR: &str = "DLR_POLLER_ENV";

/// Initialize structured logging. Safe to call more than once; only the
/// first call installs a subscriber.
pub fn init_structured_logging(log_dir: Option<&Path>) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)))
        };

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_filter(filter());

        let mut guard = None;
        let file = log_dir.and_then(|dir| {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("cannot create log directory {}: {e}", dir.display());
                return None;
            }
            let log_filename = format!(
                "{}.{}.{}.log",
                environment,
                process::id(),
                Utc::now().format("%Y%m%d_%H%M%S")
            );
            let (writer, file_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, log_filename));
            guard = Some(file_guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(filter()),
            )
        });

        let subscriber = tracing_subscriber::registry().with(console).with(file);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_dir = ?log_dir,
            "Structured logging initialized"
        );

        // the file writer stops flushing once its guard drops
        if let Some(guard) = guard {
            std::mem::forget(guard);
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(ENVIRONMENT_VAR)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "production".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" | "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "info".to_string(),
    }
}
