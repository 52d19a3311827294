//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to member events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`, or to an
//!   empty answer for read-only queries

use memd_core::{Member, ScreenName};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{MemberEvent, RegistryCommand, RegistryError};

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let roster = registry.try_add(member).await?;
/// registry.remove(screen_name).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<MemberEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<MemberEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Append a member without checking for a duplicate screen name.
    ///
    /// Combining `contains` and `add` is racy; registration goes through
    /// [`RegistryHandle::try_add`].
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add(&self, member: Member) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                member: Box::new(member),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Atomically register a member if its screen name is free.
    ///
    /// Returns the roster as it stands immediately after the add.
    ///
    /// # Errors
    ///
    /// - `RegistryError::DuplicateScreenName` if the name is taken
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_add(&self, member: Member) -> Result<Vec<Member>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::TryAdd {
                member: Box::new(member),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove every member registered under `screen_name`.
    ///
    /// Returns how many were removed; an unknown name is a no-op returning 0.
    /// Also returns 0 if the actor has shut down.
    pub async fn remove(&self, screen_name: ScreenName) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                screen_name,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Whether a member with this screen name is registered.
    pub async fn contains(&self, screen_name: ScreenName) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Contains {
                screen_name,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or_default()
    }

    /// Point-in-time copy of the roster, in registration order.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<Member> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of registered members.
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Whether the roster is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to member events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<MemberEvent> {
        self.event_sender.subscribe()
    }
}
