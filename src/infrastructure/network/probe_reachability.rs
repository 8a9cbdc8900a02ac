use crate::application::ports::reachability::Reachability;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reachability inferred from periodic TCP connects to a known endpoint.
pub struct ProbeReachability {
    addr: String,
    timeout: Duration,
    tx: Arc<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl ProbeReachability {
    /// Creates the prober without starting the periodic loop.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            addr: addr.into(),
            timeout,
            tx: Arc::new(tx),
            task: None,
        }
    }

    /// Creates the prober and probes every `interval` until dropped.
    pub fn spawn(addr: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        let mut probe = Self::new(addr, timeout);
        let addr = probe.addr.clone();
        let tx = probe.tx.clone();

        probe.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reachable = probe_once(&addr, timeout).await;
                publish(&tx, &addr, reachable);
            }
        }));
        info!(addr = %probe.addr, ?interval, "Reachability probe started");
        probe
    }
}

impl Drop for ProbeReachability {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn probe_once(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(addr, error = %e, "Probe connect failed");
            false
        }
        Err(_) => {
            debug!(addr, "Probe timed out");
            false
        }
    }
}

fn publish(tx: &watch::Sender<bool>, addr: &str, reachable: bool) {
    let changed = tx.send_if_modified(|current| {
        if *current == reachable {
            false
        } else {
            *current = reachable;
            true
        }
    });
    if changed {
        if reachable {
            info!(addr, "Network reachable");
        } else {
            warn!(addr, "Network unreachable");
        }
    }
}

#[async_trait]
impl Reachability for ProbeReachability {
    async fn is_reachable(&self) -> bool {
        let reachable = probe_once(&self.addr, self.timeout).await;
        publish(&self.tx, &self.addr, reachable);
        reachable
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
