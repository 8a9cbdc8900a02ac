use crate::application::ports::reachability::Reachability;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Receiver of reachability transitions.
#[async_trait]
pub trait ConnectivityListener: Send + Sync {
    async fn on_reachable(&self);
    async fn on_unreachable(&self);
}

/// Drives subscription lifecycle from device reachability.
///
/// Level-triggered: every notification is dispatched on its current value,
/// so repeated "reachable" events simply resubscribe.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    reachability: Arc<dyn Reachability>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConnectivityMonitor {
    pub fn new(reachability: Arc<dyn Reachability>) -> Self {
        Self {
            reachability,
            task: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn is_reachable(&self) -> bool {
        self.reachability.is_reachable().await
    }

    /// Performs the initial check, dispatching `on_reachable` when online,
    /// then follows change events until `stop` is called. Returns the initial
    /// reachability.
    pub async fn start(&self, listener: Arc<dyn ConnectivityListener>) -> bool {
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        // subscribe before the check so no transition in between is missed
        let mut rx = self.reachability.subscribe();
        let initially_reachable = self.reachability.is_reachable().await;
        info!(reachable = initially_reachable, "Initial connectivity check");
        if initially_reachable {
            listener.on_reachable().await;
        }

        *task = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let reachable = *rx.borrow_and_update();
                debug!(reachable, "Connectivity changed");
                if reachable {
                    listener.on_reachable().await;
                } else {
                    listener.on_unreachable().await;
                }
            }
            debug!("Reachability source closed");
        }));

        initially_reachable
    }

    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Aborts the follow task without waiting, for use from `Drop`.
    pub fn abort(&self) {
        if let Ok(mut task) = self.task.try_lock()
            && let Some(task) = task.take()
        {
            task.abort();
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::ManualReachability;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingListener {
        online: AtomicUsize,
        offline: AtomicUsize,
    }

    #[async_trait]
    impl ConnectivityListener for CountingListener {
        async fn on_reachable(&self) {
            self.online.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_unreachable(&self) {
            self.offline.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener was not notified in time");
    }

    #[tokio::test]
    async fn offline_start_dispatches_nothing_until_change() {
        let reachability = ManualReachability::new(false);
        let monitor = ConnectivityMonitor::new(Arc::new(reachability.clone()));
        let listener = Arc::new(CountingListener::default());

        assert!(!monitor.start(listener.clone()).await);
        assert_eq!(listener.online.load(Ordering::SeqCst), 0);

        reachability.set_reachable(true);
        wait_for(&listener.online, 1).await;

        reachability.set_reachable(false);
        wait_for(&listener.offline, 1).await;
        monitor.stop().await;
        assert!(!monitor.is_running().await);
    }

    #[tokio::test]
    async fn online_start_and_repeated_online_events() {
        let reachability = ManualReachability::new(true);
        let monitor = ConnectivityMonitor::new(Arc::new(reachability.clone()));
        let listener = Arc::new(CountingListener::default());

        assert!(monitor.start(listener.clone()).await);
        assert_eq!(listener.online.load(Ordering::SeqCst), 1);

        reachability.set_reachable(true);
        wait_for(&listener.online, 2).await;
        assert_eq!(listener.offline.load(Ordering::SeqCst), 0);
        monitor.stop().await;
    }
}
