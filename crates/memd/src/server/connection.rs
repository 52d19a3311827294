//! Connection handler for individual control connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` that runs the
//! registration state machine:
//!
//! ```text
//! AwaitingRegistration ──HELO (free name)──▶ Registered ──EXIT──▶ Terminated
//!          │                                     │
//!          └──HELO (taken name)──▶ Rejected ─────┴──I/O error / close──▶ Terminated
//! ```
//!
//! Lines that do not fit the current state are logged and ignored. Any
//! read or write failure ends the session; a registered client that goes
//! away without `EXIT` gets the same exit treatment as one that sent it.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use memd_core::Member;
use memd_protocol::{ClientMessage, DaemonMessage, Notification, MAX_LINE_LENGTH};

use crate::notify::Notifier;
use crate::registry::{RegistryError, RegistryHandle};

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a connection is in the registration protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for `HELO`
    AwaitingRegistration,
    /// Registered as this member, waiting for `EXIT`
    Registered(Member),
    /// Screen name was taken; the connection is being closed
    Rejected,
    /// Session over; nothing more is read or written
    Terminated,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Client sent `EXIT`
    Exited,
    /// Registration refused with `RJCT`
    Rejected,
    /// Client closed the connection
    Disconnected,
    /// Closed by the shutdown coordinator
    ForcedClose,
    /// Read/write failure or protocol abuse
    Failed,
}

/// Connection handler for a single control connection.
///
/// Owns both halves of the control stream and the connection's notifier;
/// all three are released when [`ConnectionHandler::run`] returns.
pub struct ConnectionHandler<R, W> {
    /// Buffered reader for incoming lines
    reader: BufReader<R>,

    /// Buffered writer for replies
    writer: BufWriter<W>,

    /// Handle to the member registry
    registry: RegistryHandle,

    /// UDP sender for join/exit announcements
    notifier: Notifier,

    /// Cancelled by the shutdown coordinator to force-close the connection
    close_token: CancellationToken,

    /// Accept counter value, used in logs
    connection_number: u64,

    state: SessionState,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the control stream
    /// * `writer` - Write half of the control stream
    /// * `registry` - Handle to the member registry
    /// * `notifier` - This connection's notification sender
    /// * `close_token` - Token that force-closes the connection
    /// * `connection_number` - Unique number for this connection
    pub fn new(
        reader: R,
        writer: W,
        registry: RegistryHandle,
        notifier: Notifier,
        close_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            registry,
            notifier,
            close_token,
            connection_number,
            state: SessionState::AwaitingRegistration,
        }
    }

    /// Runs the connection handler until the session ends.
    ///
    /// Consumes the handler, so the control stream and notifier are closed
    /// on every exit path.
    pub async fn run(mut self) -> SessionOutcome {
        debug!(connection = self.connection_number, "New client connected");

        let outcome = loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(e) => break self.terminate_on_error(e).await,
            };

            match self.handle_line(&line).await {
                Ok(Some(outcome)) => break outcome,
                Ok(None) => {}
                Err(e) => break self.terminate_on_error(e).await,
            }
        };

        self.state = SessionState::Terminated;
        info!(
            connection = self.connection_number,
            outcome = ?outcome,
            "Client disconnected"
        );
        outcome
    }

    /// Handles one control line. Returns an outcome when the session is over.
    async fn handle_line(&mut self, line: &str) -> Result<Option<SessionOutcome>, ConnectionError> {
        let message = match line.parse::<ClientMessage>() {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Invalid command from client"
                );
                return Ok(None);
            }
        };

        debug!(
            connection = self.connection_number,
            message = %message,
            "Received message"
        );

        match message {
            ClientMessage::Helo(member)
                if self.state == SessionState::AwaitingRegistration =>
            {
                self.handle_helo(member).await
            }
            ClientMessage::Exit if matches!(self.state, SessionState::Registered(_)) => {
                self.handle_exit().await
            }
            message => {
                warn!(
                    connection = self.connection_number,
                    message = %message,
                    state = ?self.state,
                    "Command not valid in current state, ignoring"
                );
                Ok(None)
            }
        }
    }

    /// Registers the client, or rejects it if the screen name is taken.
    async fn handle_helo(&mut self, member: Member) -> Result<Option<SessionOutcome>, ConnectionError> {
        match self.registry.try_add(member.clone()).await {
            Ok(roster) => {
                // Reply strictly before announcing the join. A member whose
                // ACPT never arrived was never announced, so it leaves quietly.
                if let Err(e) = self.send_message(&DaemonMessage::accept(&roster)).await {
                    self.registry.remove(member.screen_name().clone()).await;
                    return Err(e);
                }
                self.state = SessionState::Registered(member.clone());

                let recipients = self.registry.snapshot().await;
                let report = self
                    .notifier
                    .broadcast(&recipients, &Notification::join(&member))
                    .await;

                info!(
                    connection = self.connection_number,
                    screen_name = %member.screen_name(),
                    address = %member.address(),
                    notify_port = member.notify_port(),
                    notified = report.delivered,
                    failed = report.failed,
                    "Client registered"
                );
                Ok(None)
            }
            Err(RegistryError::DuplicateScreenName(screen_name)) => {
                self.state = SessionState::Rejected;
                info!(
                    connection = self.connection_number,
                    screen_name = %screen_name,
                    "Screen name taken, rejecting client"
                );
                self.send_message(&DaemonMessage::reject(screen_name)).await?;
                Ok(Some(SessionOutcome::Rejected))
            }
            Err(e) => Err(ConnectionError::Registry(e.to_string())),
        }
    }

    /// Handles an explicit `EXIT` from a registered client.
    async fn handle_exit(&mut self) -> Result<Option<SessionOutcome>, ConnectionError> {
        if let SessionState::Registered(member) =
            std::mem::replace(&mut self.state, SessionState::Terminated)
        {
            self.depart(&member).await;
        }
        Ok(Some(SessionOutcome::Exited))
    }

    /// Ends the session after a read/write failure or forced close.
    async fn terminate_on_error(&mut self, error: ConnectionError) -> SessionOutcome {
        let outcome = match error {
            ConnectionError::Eof => SessionOutcome::Disconnected,
            ConnectionError::Closed => SessionOutcome::ForcedClose,
            _ => SessionOutcome::Failed,
        };

        debug!(
            connection = self.connection_number,
            error = %error,
            "Connection ended"
        );

        if let SessionState::Registered(member) =
            std::mem::replace(&mut self.state, SessionState::Terminated)
        {
            warn!(
                connection = self.connection_number,
                screen_name = %member.screen_name(),
                outcome = ?outcome,
                "Registered client left without EXIT, removing"
            );
            self.depart(&member).await;
        }

        outcome
    }

    /// Announces the exit to the current roster, then removes the member.
    ///
    /// The broadcast runs before the removal, so the departing client's own
    /// endpoint receives its `EXIT` as well.
    async fn depart(&self, member: &Member) {
        let recipients = self.registry.snapshot().await;
        let report = self
            .notifier
            .broadcast(&recipients, &Notification::exit(member.screen_name().clone()))
            .await;

        let removed = self.registry.remove(member.screen_name().clone()).await;

        info!(
            connection = self.connection_number,
            screen_name = %member.screen_name(),
            notified = report.delivered,
            failed = report.failed,
            removed,
            "Client exited"
        );
    }

    /// Reads a single line, racing the read against a forced close.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();
        let reader = &mut self.reader;
        let close_token = &self.close_token;

        // One byte over the limit is enough to tell an oversize line
        let mut limited = reader.take(MAX_LINE_LENGTH as u64 + 1);

        let bytes_read = tokio::select! {
            _ = close_token.cancelled() => return Err(ConnectionError::Closed),
            result = limited.read_line(&mut line) => {
                result.map_err(|e| ConnectionError::Io(e.to_string()))?
            }
        };

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if !line.ends_with('\n') && line.len() > MAX_LINE_LENGTH {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_LINE_LENGTH,
            });
        }

        Ok(line)
    }

    /// Sends a reply line to the client.
    async fn send_message(&mut self, msg: &DaemonMessage) -> Result<(), ConnectionError> {
        let line = msg.to_line();
        let writer = &mut self.writer;
        let close_token = &self.close_token;

        let write = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        };

        tokio::select! {
            _ = close_token.cancelled() => Err(ConnectionError::Closed),
            result = timeout(WRITE_TIMEOUT, write) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
                Err(_) => Err(ConnectionError::WriteTimeout),
            },
        }
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Connection force-closed")]
    Closed,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Registry error: {0}")]
    Registry(String),
}
