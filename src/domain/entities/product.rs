use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PRODUCTS_COLLECTION: &str = "produtos";

/// Catalog item mirrored from `produtos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub nome: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
