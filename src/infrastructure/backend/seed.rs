//! JSON seed files for the in-memory backend.
//!
//! Layout: `{ "<collection>": [ { "id": "...", ...fields }, ... ] }`.
use super::MemoryDocumentBackend;
use crate::shared::error::AppError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn load_seed_file<P: AsRef<Path>>(path: P) -> Result<MemoryDocumentBackend, AppError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::ConfigurationError(format!("Failed to read seed file {}: {e}", path.display()))
    })?;
    let backend = MemoryDocumentBackend::new();
    let count = apply_seed(&backend, &content)?;
    info!(path = %path.display(), documents = count, "Seeded memory backend");
    Ok(backend)
}

/// Loads every document of `content` into `backend`; returns how many.
pub fn apply_seed(backend: &MemoryDocumentBackend, content: &str) -> Result<usize, AppError> {
    let root: Map<String, Value> = serde_json::from_str(content)?;
    let mut count = 0;

    for (collection, documents) in root {
        let Value::Array(documents) = documents else {
            return Err(AppError::ValidationError(format!(
                "Seed collection {collection} must be an array"
            )));
        };

        for document in documents {
            let Value::Object(fields) = document else {
                return Err(AppError::ValidationError(format!(
                    "Seed documents in {collection} must be objects"
                )));
            };
            let id = match fields.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            };
            backend.upsert_document(&collection, id.as_deref(), fields);
            count += 1;
        }
    }

    Ok(count)
}
