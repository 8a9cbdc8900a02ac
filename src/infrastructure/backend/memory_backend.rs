use crate::application::ports::document_backend::{
    BackendError, DocumentBackend, RemoteDocument, SnapshotStream,
};
use crate::domain::value_objects::CollectionName;
use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

type SnapshotResult = Result<Vec<RemoteDocument>, BackendError>;

#[derive(Default)]
struct BackendState {
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    listeners: HashMap<String, Vec<UnboundedSender<SnapshotResult>>>,
    fail_next_write: Option<String>,
    fail_watch: Option<String>,
    watch_calls: usize,
}

impl BackendState {
    fn snapshot(&self, collection: &str) -> Vec<RemoteDocument> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| RemoteDocument::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn broadcast(&mut self, collection: &str, item: SnapshotResult) {
        if let Some(listeners) = self.listeners.get_mut(collection) {
            listeners.retain(|tx| tx.unbounded_send(item.clone()).is_ok());
        }
    }

    fn publish(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        self.broadcast(collection, Ok(snapshot));
    }
}

/// In-process document database with live queries.
///
/// Documents are kept ordered by id; every mutation pushes the full result
/// set to all listeners of the affected collection.
#[derive(Clone, Default)]
pub struct MemoryDocumentBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryDocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        // a panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces a document. Returns its id (generated when `id`
    /// is `None`).
    pub fn upsert_document(
        &self,
        collection: &str,
        id: Option<&str>,
        mut fields: Map<String, Value>,
    ) -> String {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        fields.remove("id");

        let mut state = self.lock();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        state.publish(collection);
        id
    }

    pub fn remove_document(&self, collection: &str, id: &str) -> bool {
        let mut state = self.lock();
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            state.publish(collection);
        }
        removed
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    pub fn documents(&self, collection: &str) -> Vec<RemoteDocument> {
        self.lock().snapshot(collection)
    }

    /// Pushes an error to every listener of `collection`.
    pub fn fail_listeners(&self, collection: &str, message: &str) {
        let mut state = self.lock();
        state.broadcast(collection, Err(BackendError::Listener(message.to_string())));
    }

    /// Makes the next `update_field` call fail with `Rejected(message)`.
    pub fn fail_next_write(&self, message: &str) {
        self.lock().fail_next_write = Some(message.to_string());
    }

    /// Makes every `watch` call fail until cleared with `None`.
    pub fn set_watch_failure(&self, message: Option<&str>) {
        self.lock().fail_watch = message.map(str::to_string);
    }

    /// Listeners whose stream has not been dropped yet.
    pub fn active_listeners(&self, collection: &str) -> usize {
        self.lock()
            .listeners
            .get(collection)
            .map(|listeners| listeners.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn watch_calls(&self) -> usize {
        self.lock().watch_calls
    }
}

#[async_trait]
impl DocumentBackend for MemoryDocumentBackend {
    async fn watch(&self, collection: &CollectionName) -> Result<SnapshotStream, BackendError> {
        let mut state = self.lock();
        state.watch_calls += 1;
        if let Some(message) = state.fail_watch.clone() {
            return Err(BackendError::Unavailable(message));
        }

        let (tx, rx) = unbounded();
        let initial = state.snapshot(collection.as_str());
        // the receiver is alive, so the initial send cannot fail
        let _ = tx.unbounded_send(Ok(initial));
        let listeners = state
            .listeners
            .entry(collection.as_str().to_string())
            .or_default();
        // quiet collections never broadcast, so prune dropped streams here too
        listeners.retain(|tx| !tx.is_closed());
        listeners.push(tx);

        debug!(collection = %collection, "Memory backend listener registered");
        Ok(Box::pin(rx))
    }

    async fn update_field(
        &self,
        collection: &CollectionName,
        doc_id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_write.take() {
            return Err(BackendError::Rejected(message));
        }

        let doc = state
            .collections
            .get_mut(collection.as_str())
            .and_then(|docs| docs.get_mut(doc_id))
            .ok_or_else(|| BackendError::NotFound(format!("{collection}/{doc_id}")))?;
        doc.insert(field.to_string(), value);
        state.publish(collection.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn watch_delivers_initial_and_subsequent_snapshots() {
        let backend = MemoryDocumentBackend::new();
        backend.upsert_document("produtos", Some("1"), fields(json!({"nome": "Sabão"})));
        let name = CollectionName::new("produtos").unwrap();

        let mut stream = backend.watch(&name).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        backend.upsert_document("produtos", Some("2"), fields(json!({"nome": "Detergente"})));
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(
            second.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2"]
        );
    }

    #[tokio::test]
    async fn dropped_stream_is_no_longer_active() {
        let backend = MemoryDocumentBackend::new();
        let name = CollectionName::new("produtos").unwrap();

        let stream = backend.watch(&name).await.unwrap();
        assert_eq!(backend.active_listeners("produtos"), 1);
        drop(stream);
        assert_eq!(backend.active_listeners("produtos"), 0);
    }

    #[tokio::test]
    async fn update_field_writes_and_fails_on_request() {
        let backend = MemoryDocumentBackend::new();
        backend.upsert_document("agendamentos", Some("agZ1"), fields(json!({"concluido": false})));
        let name = CollectionName::new("agendamentos").unwrap();

        backend
            .update_field(&name, "agZ1", "concluido", json!(true))
            .await
            .unwrap();
        assert_eq!(
            backend.document("agendamentos", "agZ1").unwrap().get("concluido"),
            Some(&json!(true))
        );

        backend.fail_next_write("offline");
        let err = backend
            .update_field(&name, "agZ1", "concluido", json!(false))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Rejected("offline".into()));

        let missing = backend
            .update_field(&name, "nope", "concluido", json!(true))
            .await
            .unwrap_err();
        assert!(matches!(missing, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn rewatching_a_quiet_collection_prunes_dropped_listeners() {
        let backend = MemoryDocumentBackend::new();
        let name = CollectionName::new("produtos").unwrap();

        for _ in 0..5 {
            let stream = backend.watch(&name).await.unwrap();
            drop(stream);
        }
        let _live = backend.watch(&name).await.unwrap();

        assert_eq!(backend.lock().listeners.get("produtos").map(Vec::len), Some(1));
        assert_eq!(backend.active_listeners("produtos"), 1);
    }
}
