use crate::constants::STATUS_PENDING;
use crate::database::store::DlrStore;
use crate::error::{PollerError, Result};
use crate::models::PendingRecord;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-process [`DlrStore`] with the same filtering and ordering as the
/// Postgres query. Every status update is kept for inspection.
#[derive(Debug, Default)]
pub struct InMemoryDlrStore {
    rows: Mutex<BTreeMap<i64, (PendingRecord, i32)>>,
    updates: Mutex<Vec<(i64, i32)>>,
    fail_fetch_after: Mutex<Option<usize>>,
}

impl InMemoryDlrStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = PendingRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: PendingRecord) {
        self.rows.lock().insert(record.id, (record, STATUS_PENDING));
    }

    pub fn status(&self, record_id: i64) -> Option<i32> {
        self.rows.lock().get(&record_id).map(|(_, status)| *status)
    }

    /// Every `set_status` call in order.
    pub fn updates(&self) -> Vec<(i64, i32)> {
        self.updates.lock().clone()
    }

    /// Make the next fetches fail after yielding `records` rows.
    pub fn fail_fetch_after(&self, records: usize) {
        *self.fail_fetch_after.lock() = Some(records);
    }
}

#[async_trait]
impl DlrStore for InMemoryDlrStore {
    fn fetch_pending(&self, limit: i64) -> BoxStream<'_, Result<PendingRecord>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut batch: Vec<Result<PendingRecord>> = self
            .rows
            .lock()
            .values()
            .rev()
            .filter(|(_, status)| *status == STATUS_PENDING)
            .take(limit)
            .map(|(record, _)| Ok(record.clone()))
            .collect();

        if let Some(after) = *self.fail_fetch_after.lock() {
            batch.truncate(after);
            batch.push(Err(PollerError::query(
                "fetch_pending",
                "connection reset while streaming rows",
            )));
        }

        stream::iter(batch).boxed()
    }

    async fn set_status(&self, record_id: i64, status: i32) -> Result<()> {
        if let Some(row) = self.rows.lock().get_mut(&record_id) {
            row.1 = status;
        }
        self.updates.lock().push((record_id, status));
        Ok(())
    }
}
