//! `ParleyServer`: Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use parley_runtime::Bridge;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Message orchestration.
    pub bridge: Arc<Bridge>,
    /// HTTP configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The parley HTTP server.
pub struct ParleyServer {
    config: Arc<ServerConfig>,
    bridge: Arc<Bridge>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ParleyServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, bridge: Arc<Bridge>) -> Self {
        Self {
            config: Arc::new(config),
            bridge,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            bridge: self.bridge.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/message", post(handlers::message).fallback(handlers::not_found))
            .route("/health", get(handlers::health).fallback(handlers::not_found))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                info_span!(
                    "http",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %Uuid::now_v7(),
                )
            }))
    }

    /// Bind the configured address and serve until the shutdown token
    /// fires. In-flight requests drain before the returned task finishes.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated with error");
            }
        });

        info!(%addr, "parley listening");
        Ok((addr, handle))
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bridge handle.
    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
