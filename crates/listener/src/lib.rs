//! HTTP front door for the Jira intake service.
//!
//! Exposes two routes over axum:
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `POST /ingest` | Raw webhook body → [`IngestionHandler::ingest_body`] → `{message}` |
//! | `GET /hello` | Static `{"message": "Hello, World!"}` liveness response |
//!
//! The body of `/ingest` is taken as raw bytes so that invalid JSON reaches
//! the handler and is reported as a malformed payload under the configured
//! status policy, rather than being rejected by an extractor.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport only. Status codes come from the
//! [`intake::HandlerResult`]; this crate never decides them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use intake::HandlerResult;
use router::IngestionHandler;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Where the server binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Builds the application router around a shared handler.
pub fn build_router(handler: Arc<IngestionHandler>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(ingest))
        .route("/hello", get(hello))
        .with_state(handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn ingest(State(handler): State<Arc<IngestionHandler>>, body: Bytes) -> Response {
    into_response(handler.ingest_body(&body).await)
}

async fn hello() -> Response {
    (StatusCode::OK, Json(router::hello())).into_response()
}

fn into_response(result: HandlerResult) -> Response {
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(result.body())).into_response()
}

/// Binds `config` and serves until Ctrl-C or SIGTERM.
pub async fn serve(
    config: &ServerConfig,
    handler: Arc<IngestionHandler>,
) -> Result<(), ServerError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(
        addr = ?local_addr,
        policy = handler.status_policy().as_str(),
        "Jira intake listening"
    );

    axum::serve(listener, build_router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
