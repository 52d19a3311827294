//! memd Core - Shared types for chat membership tracking
//!
//! This crate provides the domain types shared between the wire
//! protocol (memd-protocol) and the daemon (memd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod member;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use member::{Member, ScreenName};
