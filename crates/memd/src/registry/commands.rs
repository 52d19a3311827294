//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `MemberEvent`: Events published by the registry after each mutation

use memd_core::{Member, ScreenName};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each query carries a oneshot channel for the response. The actor handles
/// commands one at a time, so every command is a critical section over the
/// whole member list.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Append a member unconditionally.
    Add {
        member: Box<Member>,
        respond_to: oneshot::Sender<()>,
    },

    /// Append a member unless its screen name is taken.
    ///
    /// Responds with the roster as it stands right after the add.
    ///
    /// # Errors
    /// - `RegistryError::DuplicateScreenName` if the name is already registered
    TryAdd {
        member: Box<Member>,
        respond_to: oneshot::Sender<Result<Vec<Member>, RegistryError>>,
    },

    /// Remove every member with this screen name; responds with the count removed.
    Remove {
        screen_name: ScreenName,
        respond_to: oneshot::Sender<usize>,
    },

    /// Whether any member has this screen name.
    Contains {
        screen_name: ScreenName,
        respond_to: oneshot::Sender<bool>,
    },

    /// Ordered copy of the current roster.
    Snapshot {
        respond_to: oneshot::Sender<Vec<Member>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A member with this screen name is already registered.
    #[error("screen name already registered: {0}")]
    DuplicateScreenName(ScreenName),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Member Events
// ============================================================================

/// Events published by the registry to subscribers.
#[derive(Debug, Clone)]
pub enum MemberEvent {
    /// A member was added.
    Joined {
        member: Box<Member>,
        /// Roster size after the add
        total_members: usize,
    },

    /// A remove command completed (possibly removing nothing).
    Left {
        screen_name: ScreenName,
        removed: usize,
    },
}
