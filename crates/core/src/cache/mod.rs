//! SQLite-backed cache store for versioned response namespaces.
//!
//! This module provides a persistent, origin-scoped cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Namespaces named `<app>-<version>`, created on first open
//! - Entries keyed by a SHA-256 of method and canonical URL
//! - Last-write-wins puts, atomic per key
//! - Optional per-namespace expiration (max entries, max age)
//! - A deferred request queue for background sync
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod deferred;
pub mod entries;
pub mod hash;
pub(crate) mod headers;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use deferred::DeferredEvent;
pub use entries::{CacheHandle, Expiration};
pub use namespaces::NamespaceInfo;
