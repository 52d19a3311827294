//! TCP control server for the membership daemon.
//!
//! The server:
//! - Listens on a TCP port for control connections
//! - Registers each connection with the `ShutdownCoordinator`
//! - Spawns a `ConnectionHandler` for each client
//! - Stops accepting when the coordinator's listener token is cancelled,
//!   then waits for every handler to unwind
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      track()     ┌─────────────────────┐
//! │  MemberServer   │─────────────────▶│ ShutdownCoordinator │
//! │  (TcpListener)  │                  └─────────────────────┘
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     └─────────────────┘
//! └───────┬─────────┘
//!         │ JOIN / EXIT datagrams
//!         ▼
//! ┌─────────────────┐
//! │  every member   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the server keeps running

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, SessionOutcome, SessionState};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::notify::Notifier;
use crate::registry::RegistryHandle;
use crate::shutdown::ShutdownCoordinator;

/// TCP listener for control connections.
pub struct MemberServer {
    listener: TcpListener,

    /// Handle to the member registry
    registry: RegistryHandle,

    /// Tracks live connections for forced close on shutdown
    coordinator: ShutdownCoordinator,

    /// Accept counter, also used as connection number
    connection_counter: AtomicU64,

    /// Handler tasks, awaited on shutdown
    tasks: TaskTracker,
}

impl MemberServer {
    /// Binds the control listener.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        coordinator: ShutdownCoordinator,
    ) -> Result<Self, ServerError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            coordinator,
            connection_counter: AtomicU64::new(0),
            tasks: TaskTracker::new(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Returns after the coordinator's listener token is cancelled and every
    /// connection handler has finished.
    pub async fn run(self) -> Result<(), ServerError> {
        let listen_token = self.coordinator.listener_token();

        match self.listener.local_addr() {
            Ok(addr) => info!(addr = %addr, "Member server listening"),
            Err(e) => debug!(error = %e, "Listener address unavailable"),
        }

        loop {
            tokio::select! {
                _ = listen_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            // Both branches may be ready at once; shutdown wins
                            if self.coordinator.is_shutting_down() {
                                debug!(peer = %peer, "Connection arrived during shutdown, dropping");
                                drop(stream);
                                continue;
                            }
                            let number = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            let close_token = self.coordinator.track(number).await;
                            self.handle_connection(stream, peer, number, close_token);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        let Self {
            listener,
            tasks,
            connection_counter,
            ..
        } = self;
        drop(listener);

        tasks.close();
        info!(
            open = tasks.len(),
            accepted = connection_counter.load(Ordering::Relaxed),
            "Listener closed, waiting for connections to finish"
        );
        tasks.wait().await;

        info!("Member server stopped");
        Ok(())
    }

    /// Spawns a handler task owning the new connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        number: u64,
        close_token: CancellationToken,
    ) {
        let registry = self.registry.clone();
        let coordinator = self.coordinator.clone();

        debug!(connection = number, peer = %peer, "Accepted connection");

        self.tasks.spawn(async move {
            let notifier = match Notifier::bind(number).await {
                Ok(notifier) => notifier,
                Err(e) => {
                    error!(
                        connection = number,
                        error = %e,
                        "Failed to open notification socket, dropping connection"
                    );
                    coordinator.untrack(number).await;
                    return;
                }
            };

            let (reader, writer) = stream.into_split();
            let handler =
                ConnectionHandler::new(reader, writer, registry, notifier, close_token, number);

            let outcome = handler.run().await;
            coordinator.untrack(number).await;

            debug!(
                connection = number,
                peer = %peer,
                outcome = ?outcome,
                "Connection handler finished"
            );
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}
