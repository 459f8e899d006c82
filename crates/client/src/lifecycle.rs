//! Versioned namespace lifecycle: install, activate, retire.
//!
//! State lives in a `watch` channel so the dispatcher can await activation
//! (the gate that keeps old and new namespaces from serving side by side).
//! Outbound events go to a `broadcast` channel; sends with no subscriber are
//! dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::Method;
use serde::{Deserialize, Serialize};
use shelter_core::{AppConfig, CacheDb, CacheHandle, Error, Request};
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{FetchGuard, resolve_resource};

/// Maximum concurrent critical-resource fetches during install.
const INSTALL_CONCURRENCY: usize = 4;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Installed { cached: usize, failed: usize },
    Activated { deleted: Vec<String> },
    Claimed,
    SyncRequested { tag: String },
    Redundant,
}

/// Outcome of warming the critical resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub namespace: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Lifecycle {
    config: Arc<AppConfig>,
    db: CacheDb,
    guard: FetchGuard,
    state: watch::Sender<WorkerState>,
    events: broadcast::Sender<LifecycleEvent>,
    skip_waiting: AtomicBool,
}

impl Lifecycle {
    pub fn new(config: Arc<AppConfig>, db: CacheDb, guard: FetchGuard) -> Self {
        let (state, _) = watch::channel(WorkerState::Installing);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { config, db, guard, state, events, skip_waiting: AtomicBool::new(false) }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.send(event);
    }

    /// Warm the current namespace with the critical resources.
    ///
    /// Each resource is fetched and stored independently; one that fails or
    /// answers with anything but 0/2xx is logged and reported, never fatal.
    /// Only failing to open the namespace aborts the install, which leaves
    /// this version redundant. A version retired while warming stays
    /// redundant and the install reports a lifecycle error.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let current = self.state();
        if current != WorkerState::Installing {
            return Err(Error::Lifecycle(format!("cannot install from {current}")));
        }

        let namespace = self.config.namespace();
        let cache = match self.db.open_namespace(&namespace).await {
            Ok(cache) => cache,
            Err(err) => {
                tracing::error!(namespace = %namespace, error = %err, "install failed");
                self.retire();
                return Err(err);
            }
        };

        let origin = Url::parse(&self.config.origin)
            .map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", self.config.origin)))?;
        let mut report = InstallReport { namespace: namespace.clone(), ..Default::default() };

        let permits = Arc::new(Semaphore::new(INSTALL_CONCURRENCY));
        let mut tasks = JoinSet::new();
        for path in &self.config.critical_resources {
            let url = match resolve_resource(&origin, path) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(resource = %path, error = %err, "skipping critical resource");
                    report.failed.push(path.clone());
                    continue;
                }
            };

            let guard = self.guard.clone();
            let cache = cache.clone();
            let permits = permits.clone();
            let path = path.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = warm(&guard, &cache, &Request::new(Method::GET, url)).await;
                (path, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(()))) => report.cached.push(path),
                Ok((path, Err(err))) => {
                    tracing::warn!(resource = %path, error = %err, "critical resource not cached");
                    report.failed.push(path);
                }
                Err(err) => tracing::warn!(error = %err, "install task did not complete"),
            }
        }
        report.cached.sort();
        report.failed.sort();

        if self.transition(WorkerState::Installing, WorkerState::Waiting).is_err() {
            tracing::info!(namespace = %namespace, "retired during install");
            return Err(Error::Lifecycle(format!("{namespace} was retired during install")));
        }
        tracing::info!(
            namespace = %namespace,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed"
        );
        self.emit(LifecycleEvent::Installed { cached: report.cached.len(), failed: report.failed.len() });
        Ok(report)
    }

    /// Delete superseded namespaces and take over.
    ///
    /// Only valid while waiting. A storage failure during cleanup puts the
    /// worker back to waiting so activation can be retried. Retirement during
    /// cleanup wins: the worker stays redundant.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(WorkerState::Waiting, WorkerState::Activating)?;
        let namespace = self.config.namespace();

        let deleted = match self.cleanup().await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(error = %err, "activation cleanup failed");
                if self.transition(WorkerState::Activating, WorkerState::Waiting).is_err() {
                    tracing::info!(namespace = %namespace, "retired during activation");
                }
                return Err(err);
            }
        };

        if self.transition(WorkerState::Activating, WorkerState::Active).is_err() {
            tracing::info!(namespace = %namespace, "retired during activation");
            return Err(Error::Lifecycle(format!("{namespace} was retired during activation")));
        }
        tracing::info!(namespace = %namespace, deleted = ?deleted, "activated");
        self.emit(LifecycleEvent::Activated { deleted: deleted.clone() });
        self.emit(LifecycleEvent::Claimed);
        Ok(deleted)
    }

    /// Handle a SKIP_WAITING request.
    ///
    /// Activates now when waiting. While installing the request is remembered
    /// and honoured once install finishes. Otherwise it is a no-op.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        if self.state() == WorkerState::Installing {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }
        // Install may have finished since the flag was set.
        if self.state() != WorkerState::Waiting {
            return Ok(());
        }
        match self.activate().await {
            // Another caller activated first, or this version was retired.
            Err(Error::Lifecycle(_)) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Mark this version as superseded. Pending and future requests are declined.
    pub fn retire(&self) {
        let previous = self.state.send_replace(WorkerState::Redundant);
        if previous != WorkerState::Redundant {
            tracing::info!(namespace = %self.config.namespace(), "retired");
            self.emit(LifecycleEvent::Redundant);
        }
    }

    /// Resolve once the worker is active or redundant.
    pub async fn wait_active(&self) -> WorkerState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| matches!(state, WorkerState::Active | WorkerState::Redundant))
            .await
            .map(|state| *state);
        settled.unwrap_or_else(|_| self.state())
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut actual = from;
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                actual = *state;
                false
            }
        });

        if moved { Ok(()) } else { Err(Error::Lifecycle(format!("cannot move to {to} from {actual}"))) }
    }

    async fn cleanup(&self) -> Result<Vec<String>, Error> {
        let prefix = self.config.namespace_prefix();
        let current = self.config.namespace();

        let mut deleted = Vec::new();
        for name in self.db.list_namespaces().await? {
            if name.starts_with(&prefix) && name != current {
                self.db.delete_namespace(&name).await?;
                tracing::debug!(namespace = %name, "deleted superseded namespace");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

async fn warm(guard: &FetchGuard, cache: &CacheHandle, request: &Request) -> Result<(), Error> {
    let response = guard.fetch(request).await?;
    if !(response.is_ok() || response.is_opaque()) {
        return Err(Error::Network(format!("{} answered {}", request.url(), response.status)));
    }
    cache.put(request, &response).await
}
