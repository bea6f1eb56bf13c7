//! Connection listener
//!
//! Accepts TCP connections forever and spawns one session task each.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::router::RouterHandle;

/// Bound TCP socket plus everything a new session needs
///
/// `run` accepts forever and spawns one task per connection.
pub struct Listener {
    listener: TcpListener,
    registry: Arc<Registry>,
    router: RouterHandle,
    config: Arc<Config>,
}

impl Listener {
    /// Bind to `config.bind_addr`
    pub async fn bind(
        config: Config,
        registry: Arc<Registry>,
        router: RouterHandle,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        Ok(Self {
            listener,
            registry,
            router,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; accept errors are logged and the loop continues
    pub async fn run(self) {
        info!("Chat server listening on {:?}", self.listener.local_addr());

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let registry = Arc::clone(&self.registry);
                    let router = self.router.clone();
                    let config = Arc::clone(&self.config);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry, router, &config).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
