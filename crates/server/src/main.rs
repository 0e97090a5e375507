//! shellcache server entry point.
//!
//! This is the main binary that boots the offline cache router and serves it
//! as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::router::{OfflineRouter, RouterConfig};
use shellcache_client::{FetchClient, FetchConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod host;
mod tools;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        version = %config.cache_name(),
        db = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config))?);
    let host = host::LocalHost::default();
    let router = Arc::new(OfflineRouter::new(
        RouterConfig::from_app_config(&config)?,
        Arc::new(cache.clone()),
        network.clone(),
        host.capabilities(),
    ));

    match router.install().await {
        Ok(report) => {
            if let Err(e) = router.activate().await {
                tracing::warn!(error = %e, "activation failed; requests pass through until the activate tool succeeds");
            } else {
                tracing::info!(cached = report.cached.len(), "router installed and activated");
            }
        }
        Err(e) => tracing::warn!(error = %e, "install failed; requests pass through until the install tool succeeds"),
    }

    let handler = handler::ShellcacheServer::new(router.clone(), network, cache, host);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    router.settle().await;

    Ok(())
}
