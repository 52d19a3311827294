//! Member entities and value objects.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Screen name a chat participant registers under.
///
/// Unique key of the member registry. A valid screen name is non-empty,
/// contains no whitespace (fields on the wire are space separated) and no
/// `:` (the roster entry delimiter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenName(String);

impl ScreenName {
    /// Creates a validated screen name.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(DomainError::InvalidScreenName {
                name,
                reason: "must not be empty",
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidScreenName {
                name,
                reason: "must not contain whitespace",
            });
        }
        if name.contains(':') {
            return Err(DomainError::InvalidScreenName {
                name,
                reason: "must not contain ':'",
            });
        }

        Ok(Self(name))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ScreenName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ScreenName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ScreenName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ============================================================================
// Member
// ============================================================================

/// One registered chat participant.
///
/// Immutable once built. The registry owns members; everything else works
/// on clones taken from a roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    screen_name: ScreenName,
    address: String,
    notify_port: u16,
    joined_at: DateTime<Utc>,
}

impl Member {
    /// Builds a member from registration fields.
    ///
    /// The address is trimmed of surrounding whitespace and may not contain
    /// `:` (the roster entry delimiter), which rules out IPv6 literals; use a
    /// hostname for IPv6 hosts. Port 0 is rejected since no datagram can be
    /// delivered to it.
    pub fn new(
        screen_name: ScreenName,
        address: impl AsRef<str>,
        notify_port: u16,
    ) -> DomainResult<Self> {
        let address = address.as_ref().trim();
        if address.is_empty() {
            return Err(DomainError::InvalidAddress {
                address: address.to_string(),
                reason: "must not be empty",
            });
        }
        if address.contains(':') {
            return Err(DomainError::InvalidAddress {
                address: address.to_string(),
                reason: "must not contain ':'",
            });
        }
        if notify_port == 0 {
            return Err(DomainError::InvalidPort { port: notify_port });
        }

        Ok(Self {
            screen_name,
            address: address.to_string(),
            notify_port,
            joined_at: Utc::now(),
        })
    }

    pub fn screen_name(&self) -> &ScreenName {
        &self.screen_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn notify_port(&self) -> u16 {
        self.notify_port
    }

    /// When the member was registered.
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Host/port pair notifications for this member are sent to.
    pub fn endpoint(&self) -> (&str, u16) {
        (&self.address, self.notify_port)
    }

    /// Seconds elapsed since registration.
    pub fn membership_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.joined_at)
            .num_seconds()
    }
}
