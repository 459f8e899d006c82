//! Scripted fetcher for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shelter_core::{Error, Request, Response};

use crate::fetch::Fetcher;

/// What the mock does for one fetch.
#[derive(Clone)]
pub(crate) enum Reply {
    Respond(Response),
    /// Transport failure.
    Fail,
    /// A non-transport error, to check the guard normalises it.
    Broken,
    /// Never settles.
    Hang,
    After(Duration, Box<Reply>),
}

impl Reply {
    pub(crate) fn ok(status: u16, body: &'static str) -> Self {
        Reply::Respond(Response::new(status, body))
    }
}

async fn play(mut reply: Reply) -> Result<Response, Error> {
    loop {
        match reply {
            Reply::After(delay, next) => {
                tokio::time::sleep(delay).await;
                reply = *next;
            }
            Reply::Respond(response) => return Ok(response),
            Reply::Fail => return Err(Error::Network("connection refused".into())),
            Reply::Broken => return Err(Error::InvalidInput("broken fetcher".into())),
            Reply::Hang => return std::future::pending().await,
        }
    }
}

/// Fetcher double that replays scripted replies and counts calls.
///
/// Lookup order per fetch: a reply registered for the URL path, then the next
/// queued reply, then the fallback.
pub(crate) struct MockFetcher {
    by_path: HashMap<String, Reply>,
    queue: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn build(by_path: HashMap<String, Reply>, queue: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            by_path,
            queue: Mutex::new(queue.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn always(reply: Reply) -> Arc<Self> {
        Self::build(HashMap::new(), Vec::new(), reply)
    }

    pub(crate) fn sequence(replies: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Self::build(HashMap::new(), replies, fallback)
    }

    pub(crate) fn by_path(routes: Vec<(&str, Reply)>, fallback: Reply) -> Arc<Self> {
        let routes = routes.into_iter().map(|(p, r)| (p.to_string(), r)).collect();
        Self::build(routes, Vec::new(), fallback)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = match self.by_path.get(request.url().path()) {
            Some(reply) => reply.clone(),
            None => self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone()),
        };
        play(reply).await
    }
}
