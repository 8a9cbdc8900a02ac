use super::storage_key::{KEY_PREFIX, LAST_SYNC_SUFFIX};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Collection name cannot be empty".to_string());
        }
        if value.trim() != value {
            return Err("Collection name cannot have surrounding whitespace".to_string());
        }
        // both would make storage keys of two collections collide
        if value.contains(KEY_PREFIX) {
            return Err(format!("Collection name cannot contain '{KEY_PREFIX}'"));
        }
        if value.ends_with(LAST_SYNC_SUFFIX) {
            return Err(format!("Collection name cannot end with '{LAST_SYNC_SUFFIX}'"));
        }
        Ok(())
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CollectionName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}
