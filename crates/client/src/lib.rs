//! Request-caching worker for shelter.
//!
//! This crate provides:
//! - Guarded network fetches (`Fetcher` trait, reqwest transport, timeout race)
//! - URL routing to the four caching strategies
//! - The strategy engine and response sanitizer
//! - Namespace lifecycle, control channel and background sync
//! - `Worker`, the single value a host drives

pub mod control;
pub mod dispatch;
pub mod fetch;
pub mod lifecycle;
pub mod router;
pub mod sanitize;
pub mod strategy;
pub mod sync;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use control::{ControlMessage, ControlReply};
pub use dispatch::{DeclineReason, Dispatcher, Interception};
pub use fetch::{FetchConfig, FetchGuard, Fetcher, HttpFetcher};
pub use lifecycle::{InstallReport, Lifecycle, LifecycleEvent, WorkerState};
pub use router::{RouteTable, StrategyClass};
pub use sanitize::{SECURITY_HEADERS, sanitize};
pub use strategy::{CachePolicy, StrategyEngine};
pub use sync::{ANALYTICS_SYNC_TAG, BackgroundSync, SyncReport};
pub use worker::Worker;
