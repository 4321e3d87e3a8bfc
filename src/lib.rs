//! NoteRelay is a small multi-user text relay over TCP.
//!
//! Clients connect, join under a display name, and broadcast short notes to
//! every other joined client. It provides two binaries:
//! - `relay_server`: accepts connections and relays notes between participants.
//! - `relay_client`: a line-oriented terminal client.
//!
//! The crate is structured into a few modules, each responsible for one
//! concern of the relay.

/// Properties-file configuration for both binaries.
pub mod config;
/// Logging utilities for the application.
pub mod log;
/// Wire protocol, membership registry, sessions and the accept loop.
pub mod relay;
/// Client driver, command parsing and notice rendering.
pub mod relay_client;
