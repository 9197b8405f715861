//! # DLR Poller
//!
//! Long-running service that reconciles pending Kannel delivery receipts
//! against the SMSC status API.
//!
//! Exit status is 0 after an interrupt (SIGINT/SIGTERM) and 1 when startup
//! fails or a cycle hits a fatal error.

use anyhow::{Context, Result};
use clap::Parser;
use smsc_dlr_poller::backoff::{BackoffState, PausePolicy};
use smsc_dlr_poller::client::{build_http_client, CallbackClient, StatusOracleClient};
use smsc_dlr_poller::config::{ConfigOverrides, PollerConfig, RoutingTable};
use smsc_dlr_poller::cycle::{join_within, Poller};
use smsc_dlr_poller::database::{DatabaseConnection, DlrStore, PgDlrStore};
use smsc_dlr_poller::dispatcher::WorkerPool;
use smsc_dlr_poller::logging;
use smsc_dlr_poller::processor::RecordProcessor;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dlr-poller")]
#[command(about = "Resolve pending SMS delivery receipts through the SMSC status API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Location of the Kannel configuration (default: /etc/kannel/kannel.conf)
    #[arg(long, value_name = "PATH")]
    conf: Option<PathBuf>,

    /// Worker count (default: 10)
    #[arg(long)]
    workers: Option<usize>,

    /// Records fetched per cycle (default: 1000)
    #[arg(long)]
    limit: Option<i64>,

    /// Seconds between cycles (default: 60)
    #[arg(long)]
    pause: Option<u64>,

    /// Status API endpoint (default: http://smsc.ru/sys/status.php)
    #[arg(long, value_name = "URL")]
    status_url: Option<String>,

    /// Seconds to wait for the running cycle after an interrupt (default: 30)
    #[arg(long, value_name = "SECONDS")]
    grace_period: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            conf: self.conf.clone(),
            workers: self.workers,
            limit: self.limit,
            pause_seconds: self.pause,
            status_url: self.status_url.clone(),
            shutdown_grace_seconds: self.grace_period,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("dlr-poller: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PollerConfig::load(&cli.overrides()).context("loading configuration")?;
    logging::init_structured_logging(config.log_dir.as_deref());

    serve(config)
        .await
        .inspect_err(|e| error!(error = %format!("{e:#}"), "dlr-poller exiting"))
}

async fn serve(config: PollerConfig) -> Result<()> {
    info!(
        conf = %config.conf.display(),
        workers = config.workers,
        limit = config.limit,
        pause_secs = config.pause_seconds,
        blocked_pause_secs = config.blocked_pause_seconds,
        "Starting dlr-poller"
    );

    let routing = Arc::new(
        RoutingTable::load(&config.conf).context("loading Kannel configuration")?,
    );
    if routing.gateway_count() == 0 {
        warn!("No smsc groups with an smsc-id found; every record will be unroutable");
    }

    let db = DatabaseConnection::connect(routing.storage()?, config.max_db_connections())
        .await
        .context("connecting to DLR storage")?;
    let store: Arc<dyn DlrStore> = Arc::new(PgDlrStore::new(db.pool().clone()));

    let http = build_http_client(config.http_timeout())?;
    let backoff = Arc::new(BackoffState::new());
    let processor = RecordProcessor::new(
        routing,
        StatusOracleClient::new(&config.status_url, http.clone())?,
        CallbackClient::new(http),
        store.clone(),
        backoff.clone(),
    )
    .with_unroutable_policy(config.unroutable_policy);

    let mut poller = Poller::new(
        store,
        WorkerPool::new(config.workers, Arc::new(processor)),
        backoff,
        PausePolicy::new(config.pause(), config.blocked_pause()),
        config.limit,
    );

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(wait_for_signal(shutdown.clone()));
    let token = shutdown.clone();
    let mut poller_task = tokio::spawn(async move { poller.run(token).await });

    tokio::select! {
        joined = &mut poller_task => {
            signals.abort();
            db.close().await;
            return flatten(joined);
        }
        _ = shutdown.cancelled() => {}
    }

    info!(
        grace_secs = config.shutdown_grace_seconds,
        "Shutdown requested, waiting for the running cycle"
    );
    match join_within(&mut poller_task, config.shutdown_grace()).await {
        Some(joined) => {
            flatten(joined)?;
            db.close().await;
        }
        None => warn!("Grace period elapsed, abandoning in-flight records"),
    }

    info!("dlr-poller stopped");
    Ok(())
}

fn flatten(joined: std::result::Result<smsc_dlr_poller::Result<()>, JoinError>) -> Result<()> {
    joined.context("poller task failed")?.context("poller stopped with an error")
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, only SIGINT stops the poller");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt");
    }

    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_to_overrides() {
        let cli = Cli::parse_from([
            "dlr-poller",
            "--conf",
            "/etc/kannel/test.conf",
            "--workers",
            "4",
            "--limit",
            "250",
            "--pause",
            "15",
        ]);
        let overrides = cli.overrides();

        assert_eq!(overrides.conf, Some(PathBuf::from("/etc/kannel/test.conf")));
        assert_eq!(overrides.workers, Some(4));
        assert_eq!(overrides.limit, Some(250));
        assert_eq!(overrides.pause_seconds, Some(15));
        assert_eq!(overrides.status_url, None);
    }

    #[tokio::test]
    async fn invalid_configuration_fails_before_logging_starts() {
        let cli = Cli::parse_from(["dlr-poller", "--workers", "0"]);
        let err = run(cli).await.expect_err("zero workers rejected");
        assert!(format!("{err:#}").contains("loading configuration"));
    }

    #[test]
    fn no_flags_keep_lower_layers() {
        let overrides = Cli::parse_from(["dlr-poller"]).overrides();
        assert!(overrides.workers.is_none());
        assert!(overrides.conf.is_none());
    }
}
