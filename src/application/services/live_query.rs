use super::mirror_state::MirrorState;
use super::mirror_store::LocalMirrorStore;
use crate::application::ports::document_backend::DocumentBackend;
use crate::domain::entities::MirrorRecord;
use crate::domain::value_objects::CollectionName;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Keeps at most one server-push subscription per collection.
///
/// A subscription is the task draining the backend's snapshot stream;
/// cancelling it aborts the task and waits for the stream to be dropped.
#[derive(Clone)]
pub struct LiveQuerySubscriber {
    backend: Arc<dyn DocumentBackend>,
    mirror: LocalMirrorStore,
    state: MirrorState,
    handles: Arc<Mutex<HashMap<CollectionName, JoinHandle<()>>>>,
}

impl LiveQuerySubscriber {
    pub fn new(backend: Arc<dyn DocumentBackend>, mirror: LocalMirrorStore, state: MirrorState) -> Self {
        Self {
            backend,
            mirror,
            state,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// (Re)opens the listener for `collection`, cancelling any existing one
    /// first.
    pub async fn start(&self, collection: &CollectionName) {
        let mut handles = self.handles.lock().await;
        if let Some(previous) = handles.remove(collection) {
            cancel(previous).await;
            debug!(collection = %collection, "Cancelled previous listener");
        }

        let generation = self.state.next_generation(collection).await;
        let task = tokio::spawn(run_listener(
            collection.clone(),
            generation,
            self.backend.clone(),
            self.state.clone(),
            self.mirror.clone(),
        ));
        handles.insert(collection.clone(), task);
        info!(collection = %collection, generation, "Listener started");
    }

    /// Cancels the listener if present. Snapshot and local mirror are kept.
    pub async fn stop(&self, collection: &CollectionName) {
        let mut handles = self.handles.lock().await;
        // invalidate first so a push already in flight cannot land
        self.state.next_generation(collection).await;
        if let Some(handle) = handles.remove(collection) {
            cancel(handle).await;
            info!(collection = %collection, "Listener stopped");
        }
    }

    pub async fn stop_all(&self) {
        let names: Vec<CollectionName> = self.handles.lock().await.keys().cloned().collect();
        for name in names {
            self.stop(&name).await;
        }
    }

    /// Aborts every listener without waiting, for use from `Drop`.
    pub fn abort_all(&self) {
        if let Ok(mut handles) = self.handles.try_lock() {
            for (_, handle) in handles.drain() {
                handle.abort();
            }
        }
    }

    /// Whether a listener task for `collection` is still running.
    pub async fn is_active(&self, collection: &CollectionName) -> bool {
        self.handles
            .lock()
            .await
            .get(collection)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn active_count(&self) -> usize {
        self.handles
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

async fn cancel(handle: JoinHandle<()>) {
    handle.abort();
    // resolves once the task (and its stream) has been dropped
    let _ = handle.await;
}

async fn run_listener(
    collection: CollectionName,
    generation: u64,
    backend: Arc<dyn DocumentBackend>,
    state: MirrorState,
    mirror: LocalMirrorStore,
) {
    let mut stream = match backend.watch(&collection).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(collection = %collection, error = %e, "Failed to open listener");
            state.mark_error(&collection, generation, e.to_string()).await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(documents) => {
                let records: Vec<MirrorRecord> = documents
                    .into_iter()
                    .map(|doc| MirrorRecord::new(doc.id, doc.fields))
                    .collect();
                let observed_at = Utc::now();

                if !state
                    .apply_push(&collection, generation, records.clone(), observed_at)
                    .await
                {
                    debug!(collection = %collection, generation, "Dropped stale push");
                    return;
                }
                debug!(collection = %collection, count = records.len(), "Applied push");
                mirror.save(&collection, &records, Some(observed_at)).await;
            }
            Err(e) => {
                error!(collection = %collection, error = %e, "Listener failed");
                state.mark_error(&collection, generation, e.to_string()).await;
                return;
            }
        }
    }

    debug!(collection = %collection, generation, "Listener stream ended");
}
