//! Shutdown coordination for the daemon.
//!
//! The coordinator knows about every live control connection. On shutdown
//! it stops the listener, waits a short grace period so replies already in
//! flight can be flushed, then force-closes every connection whether or not
//! its handler has finished. Handlers observe the close as a terminal
//! error on their pending read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DEFAULT_SHUTDOWN_GRACE;

/// Tracks live connections and closes them on shutdown.
///
/// Cheap to clone; all clones share the same connection set.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    grace: Duration,

    /// Cancelled first: stops the accept loop
    listener_token: CancellationToken,

    /// Parent of every connection token. Cancelled last so a connection
    /// tracked after the sweep is closed as well.
    connections_token: CancellationToken,

    /// Close token per live connection, keyed by connection number
    connections: Mutex<HashMap<u64, CancellationToken>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                grace,
                listener_token: CancellationToken::new(),
                connections_token: CancellationToken::new(),
                connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Token the listener watches to stop accepting.
    pub fn listener_token(&self) -> CancellationToken {
        self.inner.listener_token.clone()
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.listener_token.is_cancelled()
    }

    /// Starts tracking a connection and returns the token that closes it.
    pub async fn track(&self, connection: u64) -> CancellationToken {
        let token = self.inner.connections_token.child_token();
        self.inner
            .connections
            .lock()
            .await
            .insert(connection, token.clone());
        token
    }

    /// Stops tracking a connection whose handler has finished.
    pub async fn untrack(&self, connection: u64) {
        if self.inner.connections.lock().await.remove(&connection).is_some() {
            debug!(connection, "Connection untracked");
        }
    }

    /// Number of connections currently tracked.
    pub async fn live_connections(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    /// Stops the listener, waits out the grace period, then force-closes
    /// every tracked connection.
    pub async fn shutdown(&self) {
        info!(grace_ms = self.inner.grace.as_millis() as u64, "Shutdown started");
        self.inner.listener_token.cancel();

        sleep(self.inner.grace).await;

        let closed = {
            let connections = self.inner.connections.lock().await;
            for token in connections.values() {
                token.cancel();
            }
            connections.len()
        };
        self.inner.connections_token.cancel();

        info!(closed, "Force-closed open connections");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_and_untrack() {
        let coordinator = ShutdownCoordinator::new(Duration::ZERO);

        let _a = coordinator.track(1).await;
        let _b = coordinator.track(2).await;
        assert_eq!(coordinator.live_connections().await, 2);

        coordinator.untrack(1).await;
        coordinator.untrack(1).await;
        assert_eq!(coordinator.live_connections().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_listener_then_connections() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(20));
        let listener = coordinator.listener_token();
        let conn = coordinator.track(7).await;

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.shutdown().await })
        };

        listener.cancelled().await;
        assert!(coordinator.is_shutting_down());
        assert!(!conn.is_cancelled(), "connections close only after the grace period");

        task.await.unwrap();
        assert!(conn.is_cancelled());
    }

    #[tokio::test]
    async fn test_connection_tracked_after_shutdown_is_closed() {
        let coordinator = ShutdownCoordinator::new(Duration::ZERO);
        coordinator.shutdown().await;

        let late = coordinator.track(99).await;
        assert!(late.is_cancelled());
    }
}
