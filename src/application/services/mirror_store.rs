use crate::application::ports::key_value_store::KeyValueStore;
use crate::domain::entities::{MirrorEntry, MirrorRecord};
use crate::domain::value_objects::{CollectionName, StorageKey};
use crate::shared::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable best-effort cache of each collection's last-known snapshot.
///
/// Failures never reach the caller: a failed save is logged and skipped, an
/// unreadable entry loads as empty.
#[derive(Clone)]
pub struct LocalMirrorStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalMirrorStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Overwrites the persisted snapshot. `timestamp` of `None` leaves the
    /// stored last-sync value untouched.
    pub async fn save(
        &self,
        collection: &CollectionName,
        records: &[MirrorRecord],
        timestamp: Option<DateTime<Utc>>,
    ) {
        if let Err(e) = self.try_save(collection, records, timestamp).await {
            warn!(collection = %collection, error = %e, "Failed to save local mirror");
        }
    }

    async fn try_save(
        &self,
        collection: &CollectionName,
        records: &[MirrorRecord],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(records)?;
        self.kv
            .set(StorageKey::records(collection).as_str(), &payload)
            .await?;

        if let Some(timestamp) = timestamp {
            let formatted = timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
            self.kv
                .set(StorageKey::last_sync(collection).as_str(), &formatted)
                .await?;
        }

        debug!(collection = %collection, count = records.len(), "Local mirror saved");
        Ok(())
    }

    pub async fn load(&self, collection: &CollectionName) -> MirrorEntry {
        let records = match self.read(&StorageKey::records(collection)).await {
            Some(raw) => match serde_json::from_str::<Vec<MirrorRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Discarding unreadable local mirror");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let last_sync_time = self
            .read(&StorageKey::last_sync(collection))
            .await
            .and_then(|raw| match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Discarding unreadable last sync time");
                    None
                }
            });

        MirrorEntry {
            records,
            last_sync_time,
        }
    }

    /// Removes both persisted values of a collection.
    pub async fn clear(&self, collection: &CollectionName) -> Result<(), AppError> {
        self.kv.remove(StorageKey::records(collection).as_str()).await?;
        self.kv
            .remove(StorageKey::last_sync(collection).as_str())
            .await
    }

    async fn read(&self, key: &StorageKey) -> Option<String> {
        match self.kv.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read local mirror");
                None
            }
        }
    }
}
