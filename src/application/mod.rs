pub mod ports;
pub mod services;

pub use services::{
    BackgroundSync,
    LocalMirrorStore,
    ProductSync,
    SyncManager,
    SyncOptions,
};
