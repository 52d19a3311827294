//! memd Protocol - Wire formats for membership coordination
//!
//! Two channels share this crate:
//! - the control channel, a line-oriented text protocol over TCP
//!   (`HELO`/`EXIT` from clients, `ACPT`/`RJCT` from the daemon)
//! - the notification channel, one text line per UDP datagram
//!   (`JOIN`/`EXIT` broadcasts to every member)

pub mod message;
pub mod parse;

pub use message::{ClientMessage, DaemonMessage, Notification, RosterEntry};
pub use parse::ParseError;

/// Separates roster entries inside an `ACPT` reply.
pub const ROSTER_DELIMITER: char = ':';

/// Longest control line the daemon accepts, in bytes.
pub const MAX_LINE_LENGTH: usize = 1024;
