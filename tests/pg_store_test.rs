//! Postgres-backed DLR store tests.
//!
//! Requires: Postgres reachable through DATABASE_URL
//! Enable with: --features test-database

#![cfg(feature = "test-database")]

use futures::TryStreamExt;
use smsc_dlr_poller::database::{DatabaseConnection, DlrStore, PgDlrStore};
use smsc_dlr_poller::models::PendingRecord;
use sqlx::PgPool;

async fn insert_row(pool: &PgPool, smsc: &str, ts: &str, url: &str, status: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO dlr (smsc, ts, destination, url, status) \
         VALUES ($1, $2, '+79001234567', $3, $4) RETURNING id",
    )
    .bind(smsc)
    .bind(ts)
    .bind(url)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("insert dlr row")
}

async fn fetch(store: &PgDlrStore, limit: i64) -> Vec<PendingRecord> {
    store
        .fetch_pending(limit)
        .try_collect()
        .await
        .expect("fetch pending")
}

#[sqlx::test(migrations = "./migrations")]
async fn fetch_returns_pending_rows_newest_first(pool: PgPool) -> sqlx::Result<()> {
    let oldest = insert_row(&pool, "smsc_ru", "5001", "http://cb/1?s=%d", 0).await;
    insert_row(&pool, "smsc_ru", "5002", "http://cb/2?s=%d", 1).await;
    let newest = insert_row(&pool, "smsc_ru", "5003", "http://cb/3?s=%d", 0).await;

    let store = PgDlrStore::new(pool);
    let records = fetch(&store, 1000).await;

    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![newest, oldest]);
    assert_eq!(records[0].external_id, 5003);
    assert_eq!(records[0].gateway_key, "smsc_ru");
    assert_eq!(records[0].callback_url_template, "http://cb/3?s=%d");
    assert_eq!(records[0].phone, "+79001234567");
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn fetch_honors_limit(pool: PgPool) -> sqlx::Result<()> {
    for n in 0..5 {
        insert_row(&pool, "smsc_ru", &format!("{n}"), "http://cb/%d", 0).await;
    }

    let store = PgDlrStore::new(pool);
    assert_eq!(fetch(&store, 2).await.len(), 2);
    assert_eq!(fetch(&store, 0).await.len(), 0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn non_numeric_message_id_maps_to_zero(pool: PgPool) -> sqlx::Result<()> {
    insert_row(&pool, "smsc_ru", "not-a-number", "http://cb/%d", 0).await;

    let store = PgDlrStore::new(pool);
    let records = fetch(&store, 10).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].external_id, 0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn set_status_removes_row_from_pending(pool: PgPool) -> sqlx::Result<()> {
    let id = insert_row(&pool, "smsc_ru", "7001", "http://cb/%d", 0).await;

    let store = PgDlrStore::new(pool.clone());
    store.set_status(id, 2).await.expect("update status");

    let status: i32 = sqlx::query_scalar("SELECT status FROM dlr WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(status, 2);
    assert!(fetch(&store, 10).await.is_empty());

    // unknown ids are not an error
    store.set_status(id + 100, 1).await.expect("no-op update");
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn connection_health_check_succeeds(pool: PgPool) -> sqlx::Result<()> {
    let connection = DatabaseConnection::from_pool(pool);
    connection.health_check().await.expect("SELECT 1");
    Ok(())
}
