//! HTTP server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use arena_engine::prelude::Engine;

use crate::routes::create_router;
use crate::state::ApiState;

#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Handle for controlling a running API server.
#[derive(Debug)]
pub struct ApiServerHandle {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ApiServerHandle {
    /// The address the server actually bound, useful when configured with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

pub struct ApiServer {
    config: ApiServerConfig,
    engine: Arc<Engine>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, engine: Arc<Engine>) -> Self {
        Self { config, engine }
    }

    /// Bind and start serving, returning a handle for control.
    pub async fn start(self) -> Result<ApiServerHandle, ApiServerError> {
        let router = create_router(ApiState::new(self.engine));

        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        log::info!("API server listening on {}", local_addr);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                log::error!("API server error: {:?}", e);
            }
        });

        Ok(ApiServerHandle { task, local_addr })
    }

    /// Start and serve until the task ends.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let handle = self.start().await?;
        let _ = handle.join().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arena_engine::prelude::EngineConfig;

    #[test]
    fn default_config_binds_loopback() {
        let config = ApiServerConfig::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(config.listen_addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn server_binds_an_ephemeral_port() {
        let engine = Arc::new(Engine::new(EngineConfig::default()));
        let server = ApiServer::new(
            ApiServerConfig {
                listen_addr: "127.0.0.1:0".parse().unwrap(),
            },
            engine,
        );

        let handle = server.start().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        handle.abort();
    }
}
