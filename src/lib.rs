//! Offline-first mirror of remote document collections.
//!
//! Each tracked collection is restored from a local key-value store at
//! startup, kept live from the backend's push listener while the network is
//! reachable, and frozen at its last-known snapshot while it is not.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::services::{BackgroundSync, ProductSync, SyncManager, SyncOptions};
pub use domain::{CollectionName, CollectionView, MirrorChange, MirrorRecord, MirrorStatus};
pub use shared::{AppConfig, AppError, Result};
