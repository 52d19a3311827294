//! Protocol message types for control and notification traffic.

use std::fmt;

use memd_core::{Member, ScreenName};

use crate::ROSTER_DELIMITER;

/// Command keywords, shared by formatting and parsing.
pub(crate) const HELO: &str = "HELO";
pub(crate) const EXIT: &str = "EXIT";
pub(crate) const ACPT: &str = "ACPT";
pub(crate) const RJCT: &str = "RJCT";
pub(crate) const JOIN: &str = "JOIN";

/// Messages sent from client to daemon on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Registration request: `HELO <screenName> <address> <notifyPort>`
    Helo(Member),

    /// Deregistration request: `EXIT`
    Exit,
}

impl ClientMessage {
    /// Creates a registration request.
    pub fn helo(member: Member) -> Self {
        Self::Helo(member)
    }

    /// Wire form including the line terminator.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(member) => write!(
                f,
                "{HELO} {} {} {}",
                member.screen_name(),
                member.address(),
                member.notify_port()
            ),
            Self::Exit => f.write_str(EXIT),
        }
    }
}

/// One roster entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub screen_name: ScreenName,
    pub address: String,
    pub notify_port: u16,
}

impl From<&Member> for RosterEntry {
    fn from(member: &Member) -> Self {
        Self {
            screen_name: member.screen_name().clone(),
            address: member.address().to_string(),
            notify_port: member.notify_port(),
        }
    }
}

impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.screen_name, self.address, self.notify_port)
    }
}

/// Messages sent from daemon to a client on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonMessage {
    /// Registration accepted, carrying the full roster in registry order.
    Accept {
        roster: Vec<RosterEntry>,
    },

    /// Registration rejected because the screen name is taken.
    Reject {
        screen_name: ScreenName,
    },
}

impl DaemonMessage {
    /// Creates an acceptance reply from a roster snapshot.
    pub fn accept(roster: &[Member]) -> Self {
        Self::Accept {
            roster: roster.iter().map(RosterEntry::from).collect(),
        }
    }

    /// Creates a rejection reply.
    pub fn reject(screen_name: ScreenName) -> Self {
        Self::Reject { screen_name }
    }

    /// Wire form including the line terminator.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for DaemonMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept { roster } => {
                f.write_str(ACPT)?;
                f.write_str(" ")?;
                for (i, entry) in roster.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{ROSTER_DELIMITER}")?;
                    }
                    write!(f, "{entry}")?;
                }
                Ok(())
            }
            Self::Reject { screen_name } => write!(f, "{RJCT} {screen_name}"),
        }
    }
}

/// Datagrams broadcast to every member on the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A member joined: `JOIN <screenName> <address> <notifyPort>`
    Join(RosterEntry),

    /// A member left: `EXIT <screenName>`
    Exit {
        screen_name: ScreenName,
    },
}

impl Notification {
    /// Creates a join announcement for a member.
    pub fn join(member: &Member) -> Self {
        Self::Join(RosterEntry::from(member))
    }

    /// Creates an exit announcement.
    pub fn exit(screen_name: ScreenName) -> Self {
        Self::Exit { screen_name }
    }

    /// Datagram payload; each datagram carries one newline-terminated line.
    pub fn to_datagram(&self) -> Vec<u8> {
        format!("{self}\n").into_bytes()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join(entry) => write!(f, "{JOIN} {entry}"),
            Self::Exit { screen_name } => write!(f, "{EXIT} {screen_name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, port: u16) -> Member {
        Member::new(ScreenName::new(name).unwrap(), "127.0.0.1", port).unwrap()
    }

    #[test]
    fn test_helo_format() {
        let msg = ClientMessage::helo(member("alice", 9001));
        assert_eq!(msg.to_string(), "HELO alice 127.0.0.1 9001");
        assert_eq!(ClientMessage::Exit.to_line(), "EXIT\n");
    }

    #[test]
    fn test_accept_single_member() {
        let msg = DaemonMessage::accept(&[member("alice", 9001)]);
        assert_eq!(msg.to_string(), "ACPT alice 127.0.0.1 9001");
    }

    #[test]
    fn test_accept_joins_roster_without_trailing_delimiter() {
        let msg = DaemonMessage::accept(&[member("alice", 9001), member("bob", 9002)]);
        assert_eq!(
            msg.to_line(),
            "ACPT alice 127.0.0.1 9001:bob 127.0.0.1 9002\n"
        );
    }

    #[test]
    fn test_reject_format() {
        let msg = DaemonMessage::reject(ScreenName::new("alice").unwrap());
        assert_eq!(msg.to_line(), "RJCT alice\n");
    }

    #[test]
    fn test_notification_datagrams() {
        let join = Notification::join(&member("carol", 9003));
        assert_eq!(join.to_datagram(), b"JOIN carol 127.0.0.1 9003\n".to_vec());

        let exit = Notification::exit(ScreenName::new("carol").unwrap());
        assert_eq!(exit.to_datagram(), b"EXIT carol\n".to_vec());
    }
}
