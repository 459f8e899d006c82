//! shelter server entry point.
//!
//! Boots the caching worker (install, then activation) and only then serves
//! the MCP tools on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shelter_client::{FetchConfig, HttpFetcher, LifecycleEvent, Worker};
use shelter_core::{AppConfig, CacheDb};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(
        namespace = %config.namespace(),
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting shelter server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(config.as_ref()))?);
    let worker = Arc::new(Worker::new(config, db, fetcher)?);

    tokio::spawn(log_events(worker.subscribe()));

    let state = worker.start().await?;
    tracing::info!(%state, "worker ready");

    let handler = handler::ShelterServer::new(worker.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    worker.cache().clone().close().await?;

    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<LifecycleEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::info!(?event, "lifecycle event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "lifecycle event log fell behind")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
