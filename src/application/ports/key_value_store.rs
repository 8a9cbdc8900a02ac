use crate::shared::error::AppError;
use async_trait::async_trait;

/// String-only persistent key-value storage backing the local mirror.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;

    /// Keys currently stored, sorted ascending.
    async fn keys(&self) -> Result<Vec<String>, AppError>;
}
