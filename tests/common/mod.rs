#![allow(dead_code)]

pub mod mocks;

use opsync::application::ports::{DocumentBackend, RemoteDocument};
use opsync::domain::CollectionName;
use opsync::infrastructure::network::ManualReachability;
use opsync::infrastructure::storage::MemoryKeyValueStore;
use opsync::{SyncManager, SyncOptions};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn name(value: &str) -> CollectionName {
    CollectionName::new(value).expect("valid collection name")
}

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn document(id: &str, value: Value) -> RemoteDocument {
    RemoteDocument::new(id, fields(value))
}

/// Polls `condition` until it holds, panicking after `WAIT_TIMEOUT`.
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

/// Store seeded with the cold-start `produtos` mirror.
pub fn cached_products_store() -> MemoryKeyValueStore {
    MemoryKeyValueStore::with_entries([
        ("@produtos", r#"[{"id":"1","nome":"Sabão"}]"#),
        ("@produtos_lastSync", "2024-01-01T00:00:00.000Z"),
    ])
}

pub struct Harness<B> {
    pub manager: SyncManager,
    pub backend: B,
    pub reachability: ManualReachability,
    pub store: MemoryKeyValueStore,
}

pub fn harness<B>(backend: B, store: MemoryKeyValueStore, online: bool) -> Harness<B>
where
    B: DocumentBackend + Clone + 'static,
{
    let reachability = ManualReachability::new(online);
    let manager = SyncManager::new(
        SyncOptions::new(vec![name("produtos"), name("agendamentos")]),
        Arc::new(store.clone()),
        Arc::new(backend.clone()),
        Arc::new(reachability.clone()),
    );
    Harness {
        manager,
        backend,
        reachability,
        store,
    }
}
