//! Line chat server - Entry Point
//!
//! Builds the registry, starts the router loops and accepts connections.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use line_chat::{Config, Listener, Registry, Router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=info")),
        )
        .init();

    let config = Config::load()?;

    let registry = Arc::new(Registry::new());
    let (router, handle) = Router::new(Arc::clone(&registry));
    router.spawn();
    info!("Router loops started");

    let listener = Listener::bind(config, registry, handle).await?;
    info!("Start chat server on {}", listener.local_addr()?);
    listener.run().await;

    Ok(())
}
