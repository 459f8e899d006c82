//! Core types and shared functionality for shelter.
//!
//! This crate provides:
//! - Request and response models shared by every layer
//! - Cache store with SQLite backend (versioned namespaces, deferred sync queue)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{CacheDb, CacheHandle, Expiration, NamespaceInfo};
pub use config::{AppConfig, ConfigError, SyncConfig};
pub use error::Error;
pub use request::{Destination, Request};
pub use response::Response;
