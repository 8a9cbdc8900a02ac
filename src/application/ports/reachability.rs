use async_trait::async_trait;
use tokio::sync::watch;

/// Device network reachability, observed but not owned by the sync layer.
#[async_trait]
pub trait Reachability: Send + Sync {
    /// One-shot check of the current state.
    async fn is_reachable(&self) -> bool;

    /// Change events; every send is treated as a fresh notification.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
