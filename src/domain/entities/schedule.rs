use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEDULES_COLLECTION: &str = "agendamentos";

/// Logistics appointment mirrored from `agendamentos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    #[serde(default)]
    pub concluido: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schedule {
    pub fn is_completed(&self) -> bool {
        self.concluido
    }
}
