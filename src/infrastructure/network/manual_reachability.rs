use crate::application::ports::reachability::Reachability;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Reachability driven by the host application (or tests).
#[derive(Clone)]
pub struct ManualReachability {
    tx: Arc<watch::Sender<bool>>,
}

impl ManualReachability {
    pub fn new(initial: bool) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes `reachable`. Receivers are notified even when the value did
    /// not change.
    pub fn set_reachable(&self, reachable: bool) {
        self.tx.send_replace(reachable);
    }
}

#[async_trait]
impl Reachability for ManualReachability {
    async fn is_reachable(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
