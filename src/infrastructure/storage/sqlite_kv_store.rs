use crate::application::ports::key_value_store::KeyValueStore;
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

/// `KeyValueStore` persisted in the `kv_store` SQLite table.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: ConnectionPool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Opens `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = ConnectionPool::new(database_url, max_connections).await?;
        pool.migrate().await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT key FROM kv_store ORDER BY key ASC")
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("key").map_err(AppError::from))
            .collect()
    }
}
