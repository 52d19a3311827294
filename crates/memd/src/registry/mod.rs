//! Member registry using Actor pattern.
//!
//! The registry is the single shared mutable resource of the daemon: the
//! ordered list of registered chat members. It receives commands via a
//! tokio mpsc channel and processes them one at a time, so every operation
//! is serialized against every other.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ ConnectionHandler │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! └───────────────────┘     └─────────────────┘     └──────────────────┘
//!          │                        │                        │
//!          │   RegistryCommand      │   MemberEvent          │
//!          │   (mpsc channel)       │   (broadcast)          │
//!          ▼                        ▼                        ▼
//!    TryAdd/Remove/            Vec<Member>             diagnostics,
//!    Snapshot                  (insertion order)       tests
//! ```

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{MemberEvent, RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// Call once at startup and pass clones of the handle to whoever needs
/// the roster. The actor stops when the last handle is dropped.
///
/// # Example
///
/// ```no_run
/// use memd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     let roster = registry.snapshot().await;
///     assert!(roster.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
