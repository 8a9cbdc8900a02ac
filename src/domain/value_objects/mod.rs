pub mod collection_name;
pub mod mirror_status;
pub mod storage_key;

pub use collection_name::CollectionName;
pub use mirror_status::MirrorStatus;
pub use storage_key::StorageKey;
