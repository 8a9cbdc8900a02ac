pub mod background_sync;
pub mod connectivity_monitor;
pub mod live_query;
mod mirror_state;
pub mod mirror_store;
pub mod product_sync;
pub mod sync_manager;

pub use background_sync::BackgroundSync;
pub use connectivity_monitor::{ConnectivityListener, ConnectivityMonitor};
pub use live_query::LiveQuerySubscriber;
pub use mirror_state::MirrorState;
pub use mirror_store::LocalMirrorStore;
pub use product_sync::ProductSync;
pub use sync_manager::{SyncManager, SyncOptions};
