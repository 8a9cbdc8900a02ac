use crate::domain::entities::{CollectionView, MirrorChange, MirrorEntry, MirrorRecord};
use crate::domain::value_objects::{CollectionName, MirrorStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

struct Slot {
    view: CollectionView,
    // bumped on every start/stop; pushes tagged with an older value are stale
    generation: u64,
}

/// In-memory views of all tracked collections.
///
/// Every mutation goes through this type so that change notifications and
/// the stale-push guard are applied uniformly.
#[derive(Clone)]
pub struct MirrorState {
    slots: Arc<RwLock<HashMap<CollectionName, Slot>>>,
    changes: broadcast::Sender<MirrorChange>,
}

impl MirrorState {
    pub fn new(collections: &[CollectionName], change_buffer: usize) -> Self {
        let slots = collections
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Slot {
                        view: CollectionView::empty(name.clone()),
                        generation: 0,
                    },
                )
            })
            .collect();
        let (changes, _) = broadcast::channel(change_buffer.max(1));

        Self {
            slots: Arc::new(RwLock::new(slots)),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorChange> {
        self.changes.subscribe()
    }

    pub async fn contains(&self, name: &CollectionName) -> bool {
        self.slots.read().await.contains_key(name)
    }

    pub async fn view(&self, name: &CollectionName) -> Option<CollectionView> {
        self.slots
            .read()
            .await
            .get(name)
            .map(|slot| slot.view.clone())
    }

    pub async fn generation(&self, name: &CollectionName) -> Option<u64> {
        self.slots.read().await.get(name).map(|slot| slot.generation)
    }

    /// Invalidates every outstanding listener of `name` and returns the new
    /// generation.
    pub async fn next_generation(&self, name: &CollectionName) -> u64 {
        let mut slots = self.slots.write().await;
        match slots.get_mut(name) {
            Some(slot) => {
                slot.generation += 1;
                slot.generation
            }
            None => 0,
        }
    }

    pub async fn restore(&self, name: &CollectionName, entry: MirrorEntry) {
        self.mutate(name, |view| {
            view.records = entry.records;
            view.last_sync_time = entry.last_sync_time;
        })
        .await;
    }

    pub async fn set_status(&self, name: &CollectionName, status: MirrorStatus) {
        self.mutate(name, |view| view.status = status).await;
    }

    /// Replaces the snapshot wholesale. Returns `false` when `generation` is
    /// stale and nothing was applied.
    pub async fn apply_push(
        &self,
        name: &CollectionName,
        generation: u64,
        records: Vec<MirrorRecord>,
        observed_at: DateTime<Utc>,
    ) -> bool {
        self.mutate_if_current(name, generation, |view| {
            view.records = records;
            view.last_sync_time = Some(observed_at);
            view.status = MirrorStatus::Idle;
            view.last_error = None;
        })
        .await
    }

    /// Flags a listener failure; the snapshot itself is left as is.
    pub async fn mark_error(&self, name: &CollectionName, generation: u64, message: String) -> bool {
        self.mutate_if_current(name, generation, |view| {
            view.status = MirrorStatus::Error;
            view.last_error = Some(message);
        })
        .await
    }

    /// Applies `update` to the record with `id`. Returns the resulting
    /// snapshot and last-sync time, or `None` when the record is absent.
    pub async fn update_record<F>(
        &self,
        name: &CollectionName,
        id: &str,
        update: F,
    ) -> Option<(Vec<MirrorRecord>, Option<DateTime<Utc>>)>
    where
        F: FnOnce(&mut MirrorRecord),
    {
        let mut slots = self.slots.write().await;
        let slot = slots.get_mut(name)?;
        let record = slot.view.records.iter_mut().find(|r| r.id == id)?;
        update(record);

        let result = (slot.view.records.clone(), slot.view.last_sync_time);
        self.notify(&slot.view);
        Some(result)
    }

    async fn mutate<F>(&self, name: &CollectionName, update: F)
    where
        F: FnOnce(&mut CollectionView),
    {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(name) {
            update(&mut slot.view);
            self.notify(&slot.view);
        }
    }

    async fn mutate_if_current<F>(&self, name: &CollectionName, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut CollectionView),
    {
        let mut slots = self.slots.write().await;
        match slots.get_mut(name) {
            Some(slot) if slot.generation == generation => {
                update(&mut slot.view);
                self.notify(&slot.view);
                true
            }
            _ => false,
        }
    }

    fn notify(&self, view: &CollectionView) {
        // no receivers is fine
        let _ = self.changes.send(MirrorChange {
            collection: view.name.clone(),
            status: view.status,
            record_count: view.records.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn produtos() -> CollectionName {
        CollectionName::new("produtos").unwrap()
    }

    #[tokio::test]
    async fn stale_generation_is_ignored() {
        let state = MirrorState::new(&[produtos()], 8);
        let first = state.next_generation(&produtos()).await;
        let second = state.next_generation(&produtos()).await;
        assert!(second > first);

        let records = vec![MirrorRecord::new("1", Map::new())];
        assert!(!state.apply_push(&produtos(), first, records.clone(), Utc::now()).await);
        assert!(!state.mark_error(&produtos(), first, "boom".into()).await);
        let view = state.view(&produtos()).await.unwrap();
        assert!(view.records.is_empty());
        assert_eq!(view.status, MirrorStatus::Idle);

        assert!(state.apply_push(&produtos(), second, records, Utc::now()).await);
        assert_eq!(state.view(&produtos()).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let state = MirrorState::new(&[produtos()], 8);
        let mut rx = state.subscribe();

        state.set_status(&produtos(), MirrorStatus::Syncing).await;

        let change = rx.recv().await.unwrap();
        assert_eq!(change.collection, produtos());
        assert_eq!(change.status, MirrorStatus::Syncing);
    }

    #[tokio::test]
    async fn error_keeps_snapshot_and_push_clears_error() {
        let state = MirrorState::new(&[produtos()], 8);
        let generation = state.next_generation(&produtos()).await;
        let records = vec![MirrorRecord::new("1", Map::new())];
        state
            .apply_push(&produtos(), generation, records.clone(), Utc::now())
            .await;

        state
            .mark_error(&produtos(), generation, "permission denied".into())
            .await;
        let view = state.view(&produtos()).await.unwrap();
        assert_eq!(view.status, MirrorStatus::Error);
        assert_eq!(view.records, records);
        assert_eq!(view.last_error.as_deref(), Some("permission denied"));

        state
            .apply_push(&produtos(), generation, records, Utc::now())
            .await;
        let view = state.view(&produtos()).await.unwrap();
        assert_eq!(view.status, MirrorStatus::Idle);
        assert!(view.last_error.is_none());
    }

    #[tokio::test]
    async fn update_record_reports_missing_id() {
        let state = MirrorState::new(&[produtos()], 8);
        assert!(
            state
                .update_record(&produtos(), "nope", |_| {})
                .await
                .is_none()
        );
    }
}
