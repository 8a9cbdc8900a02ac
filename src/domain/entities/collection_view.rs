use super::MirrorRecord;
use crate::domain::value_objects::{CollectionName, MirrorStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What consumers see for one tracked collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub name: CollectionName,
    pub records: Vec<MirrorRecord>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub status: MirrorStatus,
    pub last_error: Option<String>,
}

impl CollectionView {
    pub fn empty(name: CollectionName) -> Self {
        Self {
            name,
            records: Vec::new(),
            last_sync_time: None,
            status: MirrorStatus::Idle,
            last_error: None,
        }
    }

    pub fn find(&self, id: &str) -> Option<&MirrorRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Persisted pair read back from the local mirror.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirrorEntry {
    pub records: Vec<MirrorRecord>,
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl MirrorEntry {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.last_sync_time.is_none()
    }
}

/// Broadcast whenever a collection's view changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorChange {
    pub collection: CollectionName,
    pub status: MirrorStatus,
    pub record_count: usize,
}
