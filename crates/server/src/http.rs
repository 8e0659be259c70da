//! HTTP server host for the orchestrator API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use sparta_engine::WorkflowEngine;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::routes::router;

/// Host configuration for an API server instance.
pub struct OrchestratorHttpServer {
    bind_address: SocketAddr,
    engine: Arc<WorkflowEngine>,
}

impl OrchestratorHttpServer {
    pub fn new(bind_address: SocketAddr, engine: Arc<WorkflowEngine>) -> Self {
        Self { bind_address, engine }
    }

    /// Bind the listener and start serving. Returns a handle for inspection and shutdown.
    pub async fn start(self) -> Result<RunningOrchestratorServer> {
        let cancellation_token = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|error| anyhow!("failed to bind {}: {error}", self.bind_address))?;
        let bound_address = listener.local_addr()?;
        info!(address = %bound_address, "orchestrator API listening");

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            let router = router(self.engine);
            async move {
                if let Err(error) = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    error!(error = %error, "orchestrator API server stopped with an error");
                }
            }
        });

        Ok(RunningOrchestratorServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

/// Runtime handle for a running API server.
#[derive(Debug)]
pub struct RunningOrchestratorServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningOrchestratorServer {
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle
            .await
            .map_err(|error| anyhow!("orchestrator API server task failed: {error}"))?;
        info!(address = %self.bind_address, "orchestrator API stopped");
        Ok(())
    }
}

/// Parse a bind address from configuration or the command line.
pub fn resolve_bind_address(bind_address: &str) -> Result<SocketAddr> {
    bind_address
        .parse()
        .map_err(|error| anyhow!("invalid bind address '{bind_address}': {error}"))
}
