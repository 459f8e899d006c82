//! The worker: one value wiring every event entry point.
//!
//! Each entry point (install, activate, fetch, message, sync) is an async
//! method the host awaits. The host must not route traffic under a new version
//! before `start` (or an explicit activation) has resolved; `handle` enforces
//! that by waiting on the activation gate.

use std::sync::Arc;

use shelter_core::{AppConfig, CacheDb, Error, Request};
use tokio::sync::broadcast;

use crate::control::{ControlMessage, ControlReply};
use crate::dispatch::{Dispatcher, Interception};
use crate::fetch::{FetchGuard, Fetcher};
use crate::lifecycle::{InstallReport, Lifecycle, LifecycleEvent, WorkerState};
use crate::strategy::{CachePolicy, StrategyEngine};
use crate::sync::{BackgroundSync, SyncReport};

pub struct Worker {
    config: Arc<AppConfig>,
    db: CacheDb,
    lifecycle: Arc<Lifecycle>,
    dispatcher: Dispatcher,
    sync: BackgroundSync,
}

impl Worker {
    /// Build a worker for the configured version.
    ///
    /// Fails only if the route table or origin in `config` is invalid.
    pub fn new(config: Arc<AppConfig>, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let guard = FetchGuard::new(fetcher, config.timeout());
        let lifecycle = Arc::new(Lifecycle::new(config.clone(), db.clone(), guard.clone()));
        let sync = BackgroundSync::new(db.clone(), guard.clone(), config.sync.clone());
        let engine = StrategyEngine::new(guard, CachePolicy::from(config.as_ref()));
        let dispatcher = Dispatcher::new(config.clone(), db.clone(), engine, lifecycle.clone(), sync.clone())?;

        Ok(Self { config, db, lifecycle, dispatcher, sync })
    }

    /// Install, then activate unless this version has to wait.
    pub async fn start(&self) -> Result<WorkerState, Error> {
        self.install().await?;
        Ok(self.lifecycle.state())
    }

    /// Warm the cache. Activates straight away when `skip_waiting` is
    /// configured or a SKIP_WAITING message arrived during install.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let report = self.lifecycle.install().await?;
        if self.config.skip_waiting || self.lifecycle.skip_waiting_requested() {
            self.lifecycle.skip_waiting().await?;
        }
        Ok(report)
    }

    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.lifecycle.activate().await
    }

    /// Interception entry point.
    pub async fn handle(&self, request: &Request) -> Result<Interception, Error> {
        self.dispatcher.handle(request).await
    }

    /// Control channel entry point.
    pub async fn on_message(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        match message {
            ControlMessage::GetVersion => Ok(ControlReply::Version { version: self.config.version.clone() }),
            ControlMessage::SkipWaiting => {
                self.lifecycle.skip_waiting().await?;
                Ok(ControlReply::ok())
            }
        }
    }

    /// Background sync entry point.
    pub async fn on_sync(&self, tag: &str) -> Result<SyncReport, Error> {
        self.sync.replay(tag).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn retire(&self) {
        self.lifecycle.retire()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.db
    }
}
