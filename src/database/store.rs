//! # DLR Store
//!
//! Record source and status sink for the cycle loop and its workers.

use crate::error::{PollerError, Result};
use crate::models::PendingRecord;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::PgPool;
use tracing::{debug, instrument};

/// Unresolved rows, newest first. `ts` holds the gateway's message id and is
/// stored as text by Kannel; rows whose `ts` is not numeric map to 0.
const FETCH_PENDING_SQL: &str = r#"
    SELECT id::BIGINT AS id,
           CASE WHEN ts::TEXT ~ '^-?[0-9]{1,18}$' THEN ts::TEXT::BIGINT ELSE 0 END AS external_id,
           COALESCE(smsc, '') AS gateway_key,
           COALESCE(url, '') AS callback_url_template,
           COALESCE(destination, '') AS phone
    FROM dlr
    WHERE status = 0
    ORDER BY id DESC
    LIMIT $1
"#;

const SET_STATUS_SQL: &str = "UPDATE dlr SET status = $1 WHERE id = $2";

#[async_trait]
pub trait DlrStore: Send + Sync {
    /// Stream up to `limit` unresolved records ordered by descending id.
    ///
    /// Records are yielded as the source produces them so dispatch can start
    /// before the whole batch is read.
    fn fetch_pending(&self, limit: i64) -> BoxStream<'_, Result<PendingRecord>>;

    /// Store the final status of one record.
    async fn set_status(&self, record_id: i64, status: i32) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PgDlrStore {
    pool: PgPool,
}

impl PgDlrStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DlrStore for PgDlrStore {
    fn fetch_pending(&self, limit: i64) -> BoxStream<'_, Result<PendingRecord>> {
        sqlx::query_as::<_, PendingRecord>(FETCH_PENDING_SQL)
            .bind(limit)
            .fetch(&self.pool)
            .map_err(|e| PollerError::query("fetch_pending", e))
            .boxed()
    }

    #[instrument(skip(self))]
    async fn set_status(&self, record_id: i64, status: i32) -> Result<()> {
        let result = sqlx::query(SET_STATUS_SQL)
            .bind(status)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PollerError::query("set_status", e))?;

        if result.rows_affected() == 0 {
            debug!(record_id, "Status update matched no row");
        }
        Ok(())
    }
}
