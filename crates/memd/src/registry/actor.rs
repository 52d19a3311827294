//! Registry actor - owns the member list and processes commands.
//!
//! The RegistryActor is the single owner of membership state.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the requester went away)

use memd_core::{Member, ScreenName};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::commands::{MemberEvent, RegistryCommand, RegistryError};

/// The registry actor - owns all membership state.
///
/// Members are kept in a `Vec` because registration order is visible to
/// clients in the roster reply. Rosters are small, so linear scans are fine.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered members in insertion order
    members: Vec<Member>,

    /// Event publisher for diagnostics and tests
    event_publisher: broadcast::Sender<MemberEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<MemberEvent>,
    ) -> Self {
        Self {
            receiver,
            members: Vec::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Member registry starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Member registry stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { member, respond_to } => {
                self.handle_add(*member);
                let _ = respond_to.send(());
            }
            RegistryCommand::TryAdd { member, respond_to } => {
                let result = self.handle_try_add(*member);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                screen_name,
                respond_to,
            } => {
                let removed = self.handle_remove(screen_name);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Contains {
                screen_name,
                respond_to,
            } => {
                let _ = respond_to.send(self.contains(&screen_name));
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.members.clone());
            }
        }
    }

    fn contains(&self, screen_name: &ScreenName) -> bool {
        self.members.iter().any(|m| m.screen_name() == screen_name)
    }

    fn handle_add(&mut self, member: Member) {
        info!(
            screen_name = %member.screen_name(),
            address = %member.address(),
            notify_port = member.notify_port(),
            total_members = self.members.len() + 1,
            "Member added"
        );

        self.members.push(member.clone());

        let _ = self.event_publisher.send(MemberEvent::Joined {
            member: Box::new(member),
            total_members: self.members.len(),
        });
    }

    /// Check and insert in the same command, so two registrations for one
    /// name cannot both succeed.
    fn handle_try_add(&mut self, member: Member) -> Result<Vec<Member>, RegistryError> {
        if self.contains(member.screen_name()) {
            debug!(
                screen_name = %member.screen_name(),
                "Screen name taken, rejecting registration"
            );
            return Err(RegistryError::DuplicateScreenName(
                member.screen_name().clone(),
            ));
        }

        self.handle_add(member);
        Ok(self.members.clone())
    }

    fn handle_remove(&mut self, screen_name: ScreenName) -> usize {
        let before = self.members.len();
        let mut membership_secs = None;

        self.members.retain(|m| {
            if m.screen_name() == &screen_name {
                membership_secs = Some(m.membership_secs());
                false
            } else {
                true
            }
        });
        let removed = before - self.members.len();

        if removed > 0 {
            info!(
                screen_name = %screen_name,
                membership_secs = ?membership_secs,
                remaining_members = self.members.len(),
                "Member removed"
            );
        } else {
            debug!(screen_name = %screen_name, "Remove for unknown member, ignoring");
        }

        let _ = self.event_publisher.send(MemberEvent::Left {
            screen_name,
            removed,
        });

        removed
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of members currently registered.
    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
