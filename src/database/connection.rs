use crate::config::StorageProfile;
use crate::error::{PollerError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Open the pool and verify the database answers. Failure here is fatal
    /// for the process.
    pub async fn connect(profile: &StorageProfile, max_connections: u32) -> Result<Self> {
        let url = profile.database_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await
            .map_err(|e| PollerError::DatabaseConnection {
                message: format!(
                    "{}:{}/{}: {e}",
                    profile.connection.host, profile.connection.port, profile.database
                ),
            })?;

        let connection = Self { pool };
        if !connection.health_check().await? {
            return Err(PollerError::DatabaseConnection {
                message: "health check returned an unexpected value".to_string(),
            });
        }

        info!(
            host = %profile.connection.host,
            database = %profile.database,
            max_connections = max_connections,
            "Connected to DLR storage"
        );
        Ok(connection)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PollerError::DatabaseConnection {
                message: e.to_string(),
            })?;

        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
