use super::CollectionName;
use std::fmt;

pub(crate) const KEY_PREFIX: &str = "@";
pub(crate) const LAST_SYNC_SUFFIX: &str = "_lastSync";

/// Key under which a local mirror value is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// `"@" + collection`, holding the JSON array of records.
    pub fn records(collection: &CollectionName) -> Self {
        Self(format!("{KEY_PREFIX}{collection}"))
    }

    /// `"@" + collection + "_lastSync"`, holding an RFC 3339 timestamp.
    pub fn last_sync(collection: &CollectionName) -> Self {
        Self(format!("{KEY_PREFIX}{collection}{LAST_SYNC_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
