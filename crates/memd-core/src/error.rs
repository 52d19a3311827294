//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when building domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Screen name is empty or contains forbidden characters
    #[error("Invalid screen name '{name}': {reason}")]
    InvalidScreenName { name: String, reason: &'static str },

    /// Member address is blank or contains forbidden characters
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    /// Notification port outside 1-65535
    #[error("Invalid notification port: {port}")]
    InvalidPort { port: u16 },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
