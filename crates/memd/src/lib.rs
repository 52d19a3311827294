//! memd - Membership coordination daemon for peer-to-peer chat
//!
//! Clients register a screen name and notification endpoint over a TCP
//! control connection, receive the current roster, and are announced to
//! every other member over UDP. This crate provides:
//! - `registry` - Member registry actor holding the roster
//! - `server` - TCP listener and per-connection protocol handler
//! - `notify` - UDP notifier broadcasting join/exit announcements
//! - `shutdown` - Coordinator that force-closes connections on exit
//! - `config` - Runtime settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        memd daemon                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  MemberServer   │────▶│     RegistryActor           │    │
//! │  │ (TCP listener)  │     │  (roster owner)             │    │
//! │  └────────┬────────┘     └─────────────────────────────┘    │
//! │           │ connections              ▲                      │
//! │           ▼                          │ try_add / remove     │
//! │  ┌─────────────────┐                 │                      │
//! │  │ConnectionHandler│─────────────────┘                      │
//! │  │  (per client)   │──────▶ Notifier (UDP JOIN / EXIT)      │
//! │  └─────────────────┘                                        │
//! │           ▲                                                 │
//! │           │ force close                                     │
//! │  ┌─────────────────────┐                                    │
//! │  │ ShutdownCoordinator │                                    │
//! │  └─────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate follows a panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod notify;
pub mod registry;
pub mod server;
pub mod shutdown;
