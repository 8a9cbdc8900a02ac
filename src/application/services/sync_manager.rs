use super::connectivity_monitor::{ConnectivityListener, ConnectivityMonitor};
use super::live_query::LiveQuerySubscriber;
use super::mirror_state::MirrorState;
use super::mirror_store::LocalMirrorStore;
use crate::application::ports::{DocumentBackend, KeyValueStore, Reachability};
use crate::domain::entities::{CollectionView, MirrorChange, MirrorRecord};
use crate::domain::value_objects::{CollectionName, MirrorStatus};
use crate::shared::config::{DEFAULT_COMPLETED_FIELD, SyncConfig};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub collections: Vec<CollectionName>,
    pub completed_field: String,
    pub change_buffer: usize,
}

impl SyncOptions {
    pub fn new(collections: Vec<CollectionName>) -> Self {
        Self {
            collections,
            completed_field: DEFAULT_COMPLETED_FIELD.to_string(),
            change_buffer: 64,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, AppError> {
        let collections = config
            .collections
            .iter()
            .map(|name| CollectionName::new(name.as_str()).map_err(AppError::ConfigurationError))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            collections,
            completed_field: config.completed_field.clone(),
            change_buffer: config.change_buffer,
        })
    }
}

struct SyncInner {
    collections: Vec<CollectionName>,
    completed_field: String,
    state: MirrorState,
    mirror: LocalMirrorStore,
    subscriber: LiveQuerySubscriber,
    backend: Arc<dyn DocumentBackend>,
    monitor: ConnectivityMonitor,
    initialized: AtomicBool,
}

impl SyncInner {
    async fn resync(&self, collection: &CollectionName) {
        self.state.set_status(collection, MirrorStatus::Syncing).await;
        self.subscriber.start(collection).await;
    }
}

impl Drop for SyncInner {
    // the last handle is gone, so no start/stop can be holding the locks
    fn drop(&mut self) {
        self.monitor.abort();
        self.subscriber.abort_all();
        debug!("SyncManager dropped, listeners aborted");
    }
}

/// Dispatches connectivity changes to the manager while it is alive. The
/// monitor task must not keep the manager alive itself.
struct ReachabilityHandler(Weak<SyncInner>);

#[async_trait]
impl ConnectivityListener for ReachabilityHandler {
    async fn on_reachable(&self) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        info!(collections = inner.collections.len(), "Online, resubscribing");
        for collection in &inner.collections {
            inner.resync(collection).await;
        }
    }

    async fn on_unreachable(&self) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        info!("Offline, closing listeners");
        for collection in &inner.collections {
            inner.subscriber.stop(collection).await;
        }
    }
}

/// Mirrors a fixed set of remote collections into memory and local storage.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<SyncInner>,
}

impl SyncManager {
    pub fn new(
        options: SyncOptions,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn DocumentBackend>,
        reachability: Arc<dyn Reachability>,
    ) -> Self {
        let state = MirrorState::new(&options.collections, options.change_buffer);
        let mirror = LocalMirrorStore::new(store);
        let subscriber = LiveQuerySubscriber::new(backend.clone(), mirror.clone(), state.clone());

        Self {
            inner: Arc::new(SyncInner {
                collections: options.collections,
                completed_field: options.completed_field,
                state,
                mirror,
                subscriber,
                backend,
                monitor: ConnectivityMonitor::new(reachability),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Restores every collection from the local mirror, then hands control to
    /// the connectivity monitor (which subscribes immediately when online).
    pub async fn initialize(&self) -> Result<(), AppError> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            warn!("SyncManager already initialized");
            return Ok(());
        }

        for collection in &self.inner.collections {
            let entry = self.inner.mirror.load(collection).await;
            debug!(
                collection = %collection,
                count = entry.records.len(),
                "Restored from local mirror"
            );
            self.inner.state.restore(collection, entry).await;
        }

        let listener: Arc<dyn ConnectivityListener> =
            Arc::new(ReachabilityHandler(Arc::downgrade(&self.inner)));
        self.inner.monitor.start(listener).await;
        Ok(())
    }

    /// Closes all listeners and stops following connectivity. In-memory and
    /// local data are kept.
    pub async fn shutdown(&self) {
        self.inner.monitor.stop().await;
        self.inner.subscriber.stop_all().await;
        self.inner.initialized.store(false, Ordering::SeqCst);
        info!("SyncManager shut down");
    }

    pub fn collections(&self) -> &[CollectionName] {
        &self.inner.collections
    }

    /// Resolves a tracked collection by name.
    pub fn collection(&self, name: &str) -> Result<CollectionName, AppError> {
        self.inner
            .collections
            .iter()
            .find(|c| c.as_str() == name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Collection {name} is not tracked")))
    }

    pub async fn view(&self, collection: &CollectionName) -> Option<CollectionView> {
        self.inner.state.view(collection).await
    }

    pub async fn views(&self) -> Vec<CollectionView> {
        let mut views = Vec::with_capacity(self.inner.collections.len());
        for collection in &self.inner.collections {
            if let Some(view) = self.inner.state.view(collection).await {
                views.push(view);
            }
        }
        views
    }

    pub async fn records(&self, collection: &CollectionName) -> Vec<MirrorRecord> {
        self.view(collection)
            .await
            .map(|view| view.records)
            .unwrap_or_default()
    }

    /// Current snapshot decoded into `T`; undecodable records are skipped.
    pub async fn records_as<T: DeserializeOwned>(&self, collection: &CollectionName) -> Vec<T> {
        self.records(collection)
            .await
            .iter()
            .filter_map(|record| match record.decode::<T>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(collection = %collection, id = %record.id, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect()
    }

    pub async fn last_sync_time(&self, collection: &CollectionName) -> Option<DateTime<Utc>> {
        self.view(collection).await.and_then(|view| view.last_sync_time)
    }

    pub async fn status(&self, collection: &CollectionName) -> Option<MirrorStatus> {
        self.view(collection).await.map(|view| view.status)
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<MirrorChange> {
        self.inner.state.subscribe()
    }

    pub async fn is_listening(&self, collection: &CollectionName) -> bool {
        self.inner.subscriber.is_active(collection).await
    }

    /// Resubscribes `collection`, or every tracked collection when `None`.
    /// A no-op while offline.
    pub async fn force_sync(&self, collection: Option<&CollectionName>) -> Result<(), AppError> {
        if let Some(collection) = collection
            && !self.inner.state.contains(collection).await
        {
            return Err(AppError::NotFound(format!(
                "Collection {collection} is not tracked"
            )));
        }

        if !self.inner.monitor.is_reachable().await {
            debug!("Force sync skipped while offline");
            return Ok(());
        }

        match collection {
            Some(collection) => self.inner.resync(collection).await,
            None => {
                for collection in &self.inner.collections {
                    self.inner.resync(collection).await;
                }
            }
        }
        Ok(())
    }

    /// Sets the completion flag on record `id` locally, then writes it to the
    /// backend when online.
    ///
    /// The local change is not rolled back if the remote write fails; the
    /// error is returned and the next push carries the server's value.
    pub async fn mark_as_completed(
        &self,
        collection: &CollectionName,
        id: &str,
    ) -> Result<(), AppError> {
        let field = self.inner.completed_field.clone();
        let (records, last_sync_time) = self
            .inner
            .state
            .update_record(collection, id, |record| {
                record.set(field.clone(), Value::Bool(true));
            })
            .await
            .ok_or_else(|| AppError::NotFound(format!("Record {collection}/{id} not found")))?;

        self.inner
            .mirror
            .save(collection, &records, last_sync_time)
            .await;

        if self.inner.monitor.is_reachable().await {
            self.inner
                .backend
                .update_field(collection, id, &field, Value::Bool(true))
                .await?;
            info!(collection = %collection, id, "Marked as completed");
        } else {
            debug!(collection = %collection, id, "Marked as completed locally while offline");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::backend::MemoryDocumentBackend;
    use crate::infrastructure::network::ManualReachability;
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        manager: SyncManager,
        backend: MemoryDocumentBackend,
        reachability: ManualReachability,
        store: MemoryKeyValueStore,
    }

    fn name(value: &str) -> CollectionName {
        CollectionName::new(value).unwrap()
    }

    fn fixture(online: bool) -> Fixture {
        let backend = MemoryDocumentBackend::new();
        let reachability = ManualReachability::new(online);
        let store = MemoryKeyValueStore::new();
        let manager = SyncManager::new(
            SyncOptions::new(vec![name("produtos"), name("agendamentos")]),
            Arc::new(store.clone()),
            Arc::new(backend.clone()),
            Arc::new(reachability.clone()),
        );
        Fixture {
            manager,
            backend,
            reachability,
            store,
        }
    }

    fn seed(backend: &MemoryDocumentBackend, collection: &str, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object");
        };
        backend.upsert_document(collection, Some(id), fields);
    }

    async fn wait_for_status(manager: &SyncManager, collection: &CollectionName, status: MirrorStatus) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while manager.status(collection).await != Some(status) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("status not reached in time");
    }

    #[tokio::test]
    async fn online_start_mirrors_backend() {
        let f = fixture(true);
        seed(&f.backend, "produtos", "1", json!({"nome": "Sabão"}));

        f.manager.initialize().await.unwrap();
        wait_for_status(&f.manager, &name("produtos"), MirrorStatus::Idle).await;

        let records = f.manager.records(&name("produtos")).await;
        assert_eq!(records.len(), 1);
        assert!(f.manager.last_sync_time(&name("produtos")).await.is_some());
        assert!(f.manager.is_listening(&name("agendamentos")).await);
        f.manager.shutdown().await;
        assert!(!f.manager.is_listening(&name("produtos")).await);
    }

    #[tokio::test]
    async fn force_sync_rejects_untracked_and_skips_offline() {
        let f = fixture(false);
        f.manager.initialize().await.unwrap();

        let err = f.manager.force_sync(Some(&name("estoque"))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        f.manager.force_sync(None).await.unwrap();
        assert_eq!(f.backend.watch_calls(), 0);
        assert_eq!(
            f.manager.status(&name("produtos")).await,
            Some(MirrorStatus::Idle)
        );
    }

    #[tokio::test]
    async fn listener_error_keeps_snapshot() {
        let f = fixture(true);
        seed(&f.backend, "produtos", "1", json!({"nome": "Sabão"}));
        f.manager.initialize().await.unwrap();
        wait_for_status(&f.manager, &name("produtos"), MirrorStatus::Idle).await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.manager.records(&name("produtos")).await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        f.backend.fail_listeners("produtos", "permission-denied");
        wait_for_status(&f.manager, &name("produtos"), MirrorStatus::Error).await;

        let view = f.manager.view(&name("produtos")).await.unwrap();
        assert_eq!(view.records.len(), 1);
        assert_eq!(
            view.last_error.as_deref(),
            Some("Listener failed: permission-denied")
        );
        // no automatic retry; the other collection is untouched
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.manager.is_listening(&name("produtos")).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        wait_for_status(&f.manager, &name("agendamentos"), MirrorStatus::Idle).await;
        assert!(f.manager.is_listening(&name("agendamentos")).await);

        f.manager.force_sync(Some(&name("produtos"))).await.unwrap();
        wait_for_status(&f.manager, &name("produtos"), MirrorStatus::Idle).await;
        f.manager.shutdown().await;
    }

    #[tokio::test]
    async fn watch_failure_sets_error() {
        let f = fixture(false);
        f.backend.set_watch_failure(Some("unavailable"));
        f.manager.initialize().await.unwrap();

        f.reachability.set_reachable(true);
        wait_for_status(&f.manager, &name("produtos"), MirrorStatus::Error).await;
        f.manager.shutdown().await;
    }

    #[tokio::test]
    async fn mark_as_completed_offline_updates_local_only() {
        let f = fixture(false);
        f.store
            .set("@agendamentos", r#"[{"id":"agZ1","concluido":false}]"#)
            .await
            .unwrap();
        seed(&f.backend, "agendamentos", "agZ1", json!({"concluido": false}));
        f.manager.initialize().await.unwrap();

        f.manager
            .mark_as_completed(&name("agendamentos"), "agZ1")
            .await
            .unwrap();

        let record = f.manager.records(&name("agendamentos")).await.remove(0);
        assert_eq!(record.get("concluido"), Some(&json!(true)));
        assert_eq!(
            f.backend.document("agendamentos", "agZ1").unwrap().get("concluido"),
            Some(&json!(false))
        );
        let persisted = f.store.get("@agendamentos").await.unwrap().unwrap();
        assert!(persisted.contains(r#""concluido":true"#));

        let missing = f
            .manager
            .mark_as_completed(&name("agendamentos"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn initialize_twice_is_harmless() {
        let f = fixture(false);
        f.manager.initialize().await.unwrap();
        f.manager.initialize().await.unwrap();
        assert_eq!(f.manager.views().await.len(), 2);
        assert!(f.manager.collection("produtos").is_ok());
        assert!(f.manager.collection("estoque").is_err());
    }
}
