//! Shared fixtures for the integration tests: a routing table, a processor
//! wired to a wiremock server, and record builders.

#![allow(dead_code)]

use smsc_dlr_poller::backoff::BackoffState;
use smsc_dlr_poller::client::{build_http_client, CallbackClient, StatusOracleClient};
use smsc_dlr_poller::config::{ConnectionProfile, RoutingTable};
use smsc_dlr_poller::database::{DlrStore, InMemoryDlrStore};
use smsc_dlr_poller::models::PendingRecord;
use smsc_dlr_poller::processor::RecordProcessor;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const GATEWAY: &str = "smsc_ru";
pub const LOGIN: &str = "alice";
pub const PASSWORD: &str = "s3cret";
pub const STATUS_PATH: &str = "/sys/status.php";
pub const CALLBACK_PATH: &str = "/dlr";

/// Address nothing listens on.
pub const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

pub fn routing_table() -> RoutingTable {
    RoutingTable::default().with_gateway(
        GATEWAY,
        ConnectionProfile {
            login: LOGIN.to_string(),
            password: PASSWORD.to_string(),
            host: "smsc.ru".to_string(),
            port: "80".to_string(),
        },
    )
}

pub fn callback_template(server: &MockServer, id: i64) -> String {
    format!("{}{CALLBACK_PATH}?id={id}&status=%d", server.uri())
}

pub fn record(server: &MockServer, id: i64) -> PendingRecord {
    PendingRecord::new(id, 1000 + id, GATEWAY, callback_template(server, id), "+79001234567")
}

pub struct Harness {
    pub store: Arc<InMemoryDlrStore>,
    pub backoff: Arc<BackoffState>,
    pub processor: RecordProcessor,
}

/// Processor whose status API is `oracle_base` + [`STATUS_PATH`].
pub fn harness(oracle_base: &str, records: Vec<PendingRecord>) -> Harness {
    let store = Arc::new(InMemoryDlrStore::with_records(records));
    let backoff = Arc::new(BackoffState::new());
    let http = build_http_client(Duration::from_secs(5)).expect("http client");
    let oracle = StatusOracleClient::new(&format!("{oracle_base}{STATUS_PATH}"), http.clone())
        .expect("oracle url");

    let processor = RecordProcessor::new(
        Arc::new(routing_table()),
        oracle,
        CallbackClient::new(http),
        store.clone() as Arc<dyn DlrStore>,
        backoff.clone(),
    );

    Harness {
        store,
        backoff,
        processor,
    }
}

pub fn status_body(status: i64, err: i64, error_code: i64) -> serde_json::Value {
    serde_json::json!({
        "status": status,
        "err": err,
        "error": "",
        "error_code": error_code,
    })
}
