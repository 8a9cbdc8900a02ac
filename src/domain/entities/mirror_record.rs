use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One mirrored document: its identifier plus an arbitrary field map.
///
/// Serialises flat as `{"id": ..., ...fields}`, which is also the layout of
/// each element persisted in the local mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MirrorRecord {
    pub fn new(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        // the document id always wins over an `id` stored inside the document
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Decodes the record into a typed domain struct.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}
