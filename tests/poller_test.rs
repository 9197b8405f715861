//! Cycle Integration Tests
//!
//! Full fetch/dispatch/backoff cycles with the real record processor, an
//! in-memory DLR table and a wiremock status API.

mod common;

use common::*;
use smsc_dlr_poller::backoff::PausePolicy;
use smsc_dlr_poller::cycle::Poller;
use smsc_dlr_poller::database::{DlrStore, InMemoryDlrStore};
use smsc_dlr_poller::dispatcher::WorkerPool;
use smsc_dlr_poller::processor::RecordProcessor;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASELINE: Duration = Duration::from_secs(60);
const EXTENDED: Duration = Duration::from_secs(600);

fn poller(
    h: Harness,
    workers: usize,
    limit: i64,
) -> (Poller<RecordProcessor>, Arc<InMemoryDlrStore>) {
    let poller = Poller::new(
        h.store.clone() as Arc<dyn DlrStore>,
        WorkerPool::new(workers, Arc::new(h.processor)),
        h.backoff,
        PausePolicy::new(BASELINE, EXTENDED),
        limit,
    );
    (poller, h.store)
}

async fn mount_status_for(server: &MockServer, external_id: i64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .and(query_param("id", external_id.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(Duration::from_millis(30)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn batch_of_three_with_two_workers_resolves_everything() {
    let server = MockServer::start().await;
    for id in 1..=3 {
        mount_status_for(&server, 1000 + id, status_body(1, 0, 0)).await;
    }
    Mock::given(path(CALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let records = (1..=3).map(|id| record(&server, id)).collect();
    let (mut poller, store) = poller(harness(&server.uri(), records), 2, 1000);

    let summary = poller.run_cycle().await.expect("cycle");

    assert_eq!(summary.report.dispatched, 3);
    assert_eq!(summary.report.resolved, 3);
    assert_eq!(summary.next_pause, BASELINE);
    for id in 1..=3 {
        assert_eq!(store.status(id), Some(1));
    }
}

#[tokio::test]
async fn throttled_record_extends_next_pause_only() {
    let server = MockServer::start().await;
    mount_status_for(&server, 1001, status_body(2, 0, 0)).await;
    mount_status_for(&server, 1002, status_body(0, 0, 6)).await;
    Mock::given(path(CALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let records = vec![record(&server, 1), record(&server, 2)];
    let (mut poller, store) = poller(harness(&server.uri(), records), 2, 1000);

    let first = poller.run_cycle().await.expect("first cycle");
    assert!(first.was_blocked);
    assert_eq!(first.next_pause, EXTENDED);
    assert_eq!(first.report.throttled, 1);
    assert_eq!(store.status(1), Some(2));
    assert_eq!(store.status(2), Some(0));

    // upstream recovers; the throttled record is retried
    server.reset().await;
    mount_status_for(&server, 1002, status_body(1, 0, 0)).await;
    Mock::given(path(CALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let second = poller.run_cycle().await.expect("second cycle");
    assert!(!second.was_blocked);
    assert_eq!(second.next_pause, BASELINE);
    assert_eq!(second.report.dispatched, 1);
    assert_eq!(store.status(2), Some(1));
}

#[tokio::test]
async fn resolved_records_are_never_refetched() {
    let server = MockServer::start().await;
    mount_status_for(&server, 1001, status_body(1, 0, 0)).await;
    mount_status_for(&server, 1002, status_body(0, 0, 0)).await;
    Mock::given(path(CALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let records = vec![record(&server, 1), record(&server, 2)];
    let (mut poller, store) = poller(harness(&server.uri(), records), 4, 1000);

    let first = poller.run_cycle().await.expect("first cycle");
    assert_eq!(first.report.dispatched, 2);
    assert_eq!(first.report.pending, 1);

    let second = poller.run_cycle().await.expect("second cycle");
    assert_eq!(second.report.dispatched, 1);
    assert_eq!(second.report.pending, 1);
    assert_eq!(store.updates(), vec![(1, 1)]);
}

#[tokio::test]
async fn limit_bounds_each_batch_newest_first() {
    let server = MockServer::start().await;
    for id in 1..=5 {
        mount_status_for(&server, 1000 + id, status_body(0, 0, 0)).await;
    }

    let records = (1..=5).map(|id| record(&server, id)).collect();
    let (mut poller, _store) = poller(harness(&server.uri(), records), 1, 2);

    let summary = poller.run_cycle().await.expect("cycle");
    assert_eq!(summary.report.dispatched, 2);

    let mut queried: Vec<String> = server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    queried.sort();
    assert_eq!(queried, vec!["1004".to_string(), "1005".to_string()]);
}
