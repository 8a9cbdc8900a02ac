pub mod document_backend;
pub mod key_value_store;
pub mod reachability;

pub use document_backend::{BackendError, DocumentBackend, RemoteDocument, SnapshotStream};
pub use key_value_store::KeyValueStore;
pub use reachability::Reachability;
