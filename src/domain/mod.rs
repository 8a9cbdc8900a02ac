pub mod entities;
pub mod value_objects;

pub use entities::{CollectionView, MirrorChange, MirrorEntry, MirrorRecord, Product, Schedule};
pub use value_objects::{CollectionName, MirrorStatus, StorageKey};
