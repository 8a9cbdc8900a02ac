use super::sync_manager::{SyncManager, SyncOptions};
use crate::application::ports::{DocumentBackend, KeyValueStore, Reachability};
use crate::domain::entities::{CollectionView, PRODUCTS_COLLECTION, Product};
use crate::domain::value_objects::CollectionName;
use crate::shared::error::AppError;
use std::sync::Arc;

/// Mirrors the `produtos` catalog only.
#[derive(Clone)]
pub struct ProductSync {
    manager: SyncManager,
    products: CollectionName,
}

impl ProductSync {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn DocumentBackend>,
        reachability: Arc<dyn Reachability>,
    ) -> Result<Self, AppError> {
        let products = CollectionName::new(PRODUCTS_COLLECTION).map_err(AppError::Internal)?;
        let options = SyncOptions::new(vec![products.clone()]);

        Ok(Self {
            manager: SyncManager::new(options, store, backend, reachability),
            products,
        })
    }

    pub async fn initialize(&self) -> Result<(), AppError> {
        self.manager.initialize().await
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    pub async fn products(&self) -> Vec<Product> {
        self.manager.records_as(&self.products).await
    }

    pub async fn view(&self) -> Option<CollectionView> {
        self.manager.view(&self.products).await
    }

    pub async fn force_sync(&self) -> Result<(), AppError> {
        self.manager.force_sync(Some(&self.products)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::MirrorStatus;
    use crate::infrastructure::backend::MemoryDocumentBackend;
    use crate::infrastructure::network::ManualReachability;
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use serde_json::{Map, Value, json};
    use std::time::Duration;

    #[tokio::test]
    async fn follows_products_only() {
        let backend = MemoryDocumentBackend::new();
        let Value::Object(fields) = json!({"nome": "Detergente"}) else {
            unreachable!()
        };
        backend.upsert_document("produtos", Some("2"), fields);
        backend.upsert_document("agendamentos", Some("agZ1"), Map::new());

        let sync = ProductSync::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(backend.clone()),
            Arc::new(ManualReachability::new(true)),
        )
        .unwrap();
        sync.initialize().await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while sync.products().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(sync.products().await[0].nome, "Detergente");
        assert_eq!(sync.view().await.unwrap().status, MirrorStatus::Idle);
        assert_eq!(backend.active_listeners("agendamentos"), 0);
        assert_eq!(sync.manager().collections().len(), 1);
        sync.shutdown().await;
    }
}
