use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use opsync::application::ports::{BackendError, DocumentBackend, RemoteDocument, SnapshotStream};
use opsync::domain::CollectionName;
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Sender = UnboundedSender<Result<Vec<RemoteDocument>, BackendError>>;

/// Backend whose pushes are driven entirely by the test. `watch` opens a
/// stream that stays silent until `push` is called.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    streams: Arc<Mutex<Vec<(String, Sender)>>>,
    writes: Arc<Mutex<Vec<(String, String, String, Value)>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_count(&self, collection: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == collection)
            .count()
    }

    pub fn open_streams(&self, collection: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, tx)| name == collection && !tx.is_closed())
            .count()
    }

    /// Sends `documents` to every open stream of `collection`; returns how
    /// many received it.
    pub fn push(&self, collection: &str, documents: Vec<RemoteDocument>) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == collection)
            .filter(|(_, tx)| tx.unbounded_send(Ok(documents.clone())).is_ok())
            .count()
    }

    pub fn writes(&self) -> Vec<(String, String, String, Value)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentBackend for ScriptedBackend {
    async fn watch(&self, collection: &CollectionName) -> Result<SnapshotStream, BackendError> {
        let (tx, rx) = unbounded();
        self.streams
            .lock()
            .unwrap()
            .push((collection.as_str().to_string(), tx));
        Ok(Box::pin(rx))
    }

    async fn update_field(
        &self,
        collection: &CollectionName,
        doc_id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), BackendError> {
        self.writes.lock().unwrap().push((
            collection.as_str().to_string(),
            doc_id.to_string(),
            field.to_string(),
            value,
        ));
        Ok(())
    }
}
