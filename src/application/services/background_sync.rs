use super::sync_manager::{SyncManager, SyncOptions};
use crate::application::ports::{DocumentBackend, KeyValueStore, Reachability};
use crate::domain::entities::{
    CollectionView, PRODUCTS_COLLECTION, Product, SCHEDULES_COLLECTION, Schedule,
};
use crate::domain::value_objects::CollectionName;
use crate::shared::error::AppError;
use std::sync::Arc;

/// Mirrors `produtos` and `agendamentos`; schedules can be marked completed.
#[derive(Clone)]
pub struct BackgroundSync {
    manager: SyncManager,
    products: CollectionName,
    schedules: CollectionName,
}

impl BackgroundSync {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn DocumentBackend>,
        reachability: Arc<dyn Reachability>,
    ) -> Result<Self, AppError> {
        Self::with_options(|_| {}, store, backend, reachability)
    }

    /// Like `new`, letting the caller adjust the options (completed field,
    /// change buffer) before the manager is built.
    pub fn with_options<F>(
        configure: F,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn DocumentBackend>,
        reachability: Arc<dyn Reachability>,
    ) -> Result<Self, AppError>
    where
        F: FnOnce(&mut SyncOptions),
    {
        let products = CollectionName::new(PRODUCTS_COLLECTION).map_err(AppError::Internal)?;
        let schedules = CollectionName::new(SCHEDULES_COLLECTION).map_err(AppError::Internal)?;

        let mut options = SyncOptions::new(vec![products.clone(), schedules.clone()]);
        configure(&mut options);
        options.collections = vec![products.clone(), schedules.clone()];

        Ok(Self {
            manager: SyncManager::new(options, store, backend, reachability),
            products,
            schedules,
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

    pub async fn schedules(&self) -> Vec<Schedule> {
        self.manager.records_as(&self.schedules).await
    }

    pub async fn products_view(&self) -> Option<CollectionView> {
        self.manager.view(&self.products).await
    }

    pub async fn schedules_view(&self) -> Option<CollectionView> {
        self.manager.view(&self.schedules).await
    }

    /// Resubscribes the named collection, or both when `None`.
    pub async fn force_sync(&self, collection: Option<&str>) -> Result<(), AppError> {
        match collection {
            Some(name) => {
                let collection = self.manager.collection(name)?;
                self.manager.force_sync(Some(&collection)).await
            }
            None => self.manager.force_sync(None).await,
        }
    }

    /// Marks schedule `id` as completed (see `SyncManager::mark_as_completed`).
    pub async fn mark_as_completed(&self, id: &str) -> Result<(), AppError> {
        self.manager.mark_as_completed(&self.schedules, id).await
    }
}
