use crate::domain::value_objects::CollectionName;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Listener failed: {0}")]
    Listener(String),
}

/// A document as delivered by the remote database.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Every item is the complete result set of the watched collection.
pub type SnapshotStream = BoxStream<'static, Result<Vec<RemoteDocument>, BackendError>>;

/// Remote document database with live queries and point writes.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Opens a server-push listener. Dropping the stream releases it.
    async fn watch(&self, collection: &CollectionName) -> Result<SnapshotStream, BackendError>;

    /// Writes a single field of a single document.
    async fn update_field(
        &self,
        collection: &CollectionName,
        doc_id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), BackendError>;
}
