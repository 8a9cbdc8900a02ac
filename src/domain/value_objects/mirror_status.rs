use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse sync state of one tracked collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorStatus {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl MirrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorStatus::Idle => "idle",
            MirrorStatus::Syncing => "syncing",
            MirrorStatus::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MirrorStatus::Error)
    }
}

impl fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for MirrorStatus {
    fn from(value: &str) -> Self {
        match value {
            "syncing" => MirrorStatus::Syncing,
            "error" => MirrorStatus::Error,
            _ => MirrorStatus::Idle,
        }
    }
}
