//! API Server
//!
//! Serves the REST router until shutdown. Shutdown cancels the token every
//! request token derives from, so in-flight resolution and mount retries
//! stop before the listener drains.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{Mounter, OffloadProcessor, VolumeBackend};
use crate::error::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server
pub struct ApiServer<B, O, M> {
    config: ApiServerConfig,
    orchestrator: Arc<VolumeOrchestrator<B, O, M>>,
    shutdown: CancellationToken,
}

impl<B, O, M> ApiServer<B, O, M>
where
    B: VolumeBackend + 'static,
    O: OffloadProcessor + 'static,
    M: Mounter + 'static,
{
    /// Create a new API server
    pub fn new(config: ApiServerConfig, orchestrator: Arc<VolumeOrchestrator<B, O, M>>) -> Self {
        Self {
            config,
            orchestrator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled on shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until [`ApiServer::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.rest_addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<()> {
        let app = RestRouter::new(self.orchestrator.clone(), self.shutdown.clone()).build();
        let local = listener.local_addr().map_err(Error::internal)?;
        info!("REST API listening on {}", local);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Shut down once `signal` fires. A signal listener that fails to
    /// install leaves the server running.
    pub async fn shutdown_on<F>(&self, signal: F)
    where
        F: Future<Output = std::io::Result<()>>,
    {
        match signal.await {
            Ok(()) => {
                info!("Received shutdown signal");
                self.shutdown();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::testing::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.rest_addr.port(), 8090);
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            None,
            MockMounter::new(&log),
        );
        let server = Arc::new(ApiServer::new(ApiServerConfig::default(), Arc::new(orch)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(listener).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        server.shutdown();
        assert!(server.shutdown_token().is_cancelled());

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_only_on_delivered_signal() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = Arc::new(orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            None,
            MockMounter::new(&log),
        ));

        let server = ApiServer::new(ApiServerConfig::default(), orch.clone());
        let failed = async {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no signal handler",
            ))
        };
        server.shutdown_on(failed).await;
        assert!(!server.shutdown_token().is_cancelled());

        let server = ApiServer::new(ApiServerConfig::default(), orch);
        server.shutdown_on(async { Ok(()) }).await;
        assert!(server.shutdown_token().is_cancelled());
    }
}
