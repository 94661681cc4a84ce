use tokio::net::TcpListener;

use crate::config::FerryConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The ferry HTTP server.
pub struct FerryServer {
    config: FerryConfig,
    state: AppState,
}

impl FerryServer {
    pub fn new(config: FerryConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Open the configured backends and build a server over them.
    pub async fn from_config(config: FerryConfig) -> ServerResult<Self> {
        config.validate()?;
        let state = AppState::from_config(&config).await?;
        Ok(Self::new(config, state))
    }

    pub fn config(&self) -> &FerryConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.server.max_body_bytes)
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.server.bind_addr).await?;
        tracing::info!("ferry server listening on {}", self.config.server.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
