//! API server

use crate::routes::create_router;
use crate::state::AppState;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// Allow any origin, for dashboards served elsewhere
    pub cors: bool,
    /// Period of the reconciler; zero disables it
    pub reconcile_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            cors: true,
            reconcile_interval_ms: 100,
        }
    }
}

impl ServerConfig {
    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set reconciler period
    #[must_use]
    pub fn with_reconcile_interval(mut self, interval_ms: u64) -> Self {
        self.reconcile_interval_ms = interval_ms;
        self
    }
}

/// HTTP front of the fabric control plane
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a server over built state
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Router with tracing and CORS layers
    #[must_use]
    pub fn router(&self) -> Router {
        let router = create_router(self.state.clone()).layer(TraceLayer::new_for_http());
        if self.config.cors {
            router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        } else {
            router
        }
    }

    /// Serve until ctrl-c, running the reconciler alongside
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be parsed or bound
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.config.bind.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "corridor control plane listening");

        let reconciler = (self.config.reconcile_interval_ms > 0).then(|| {
            self.state
                .supervisor
                .spawn_reconciler(Duration::from_millis(self.config.reconcile_interval_ms))
        });

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;
        if let Some(handle) = reconciler {
            handle.abort();
        }
        info!("corridor control plane stopped");
        Ok(result?)
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; run until killed
        std::future::pending::<()>().await;
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
