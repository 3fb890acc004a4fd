use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Operating mode of the primary orchestrator with respect to the backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Failover,
}

/// Process-wide shared state tracking whether the backup is presumed
/// reachable. Modeled as a single atomic flag rather than a lock-protected
/// struct: reads happen on every mutation's hot path and must never block
/// on a writer holding a mutex.
#[derive(Clone)]
pub struct FailoverManager {
    in_failover: Arc<AtomicBool>,
}

impl FailoverManager {
    pub fn new() -> Self {
        Self {
            in_failover: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking read of the current mode, for the orchestrator to
    /// consult before deciding whether to replicate.
    pub fn mode(&self) -> Mode {
        if self.in_failover.load(Ordering::Acquire) {
            Mode::Failover
        } else {
            Mode::Normal
        }
    }

    /// Called synchronously by the orchestrator on a failed `replicate`
    /// call, so a stale NORMAL reading doesn't persist for up to a full
    /// health-check interval.
    pub fn demote(&self) {
        if !self.in_failover.swap(true, Ordering::AcqRel) {
            tracing::warn!("replication unreachable, entering FAILOVER mode");
        }
    }

    fn promote(&self) {
        if self.in_failover.swap(false, Ordering::AcqRel) {
            tracing::warn!("backup ping succeeded, returning to NORMAL mode (divergence during FAILOVER is not reconciled)");
        }
    }

    /// Spawn the background health-ping loop that periodically probes the
    /// backup and flips the mode accordingly. `ping` is expected to be
    /// `ReplicationClient::ping`, injected so this module has no direct
    /// dependency on the transport.
    pub fn spawn_health_loop<F, Fut>(&self, interval: Duration, ping: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if ping().await {
                    manager.promote();
                } else {
                    manager.demote();
                }
            }
        });
    }
}

impl Default for FailoverManager {
    fn default() -> Self {
        Self::new()
    }
}
