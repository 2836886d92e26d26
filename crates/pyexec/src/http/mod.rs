//! HTTP API
//!
//! Exposes the runner over JSON: one execute endpoint (mounted at its
//! historical path and at `/execute`), a health check and a JSON 404.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub use crate::http::response::{ApiError, ExecuteRequest, ExecuteResponse};
use crate::http::response::HealthResponse;
use crate::runner::{IntakeError, Runner};

mod response;

/// Path the execute endpoint was historically mounted at
pub const EXECUTE_PATH: &str = "/api/execute/python/execute";
/// Short alias of [`EXECUTE_PATH`]
pub const EXECUTE_ALIAS: &str = "/execute";
pub const HEALTH_PATH: &str = "/api/health";

/// Build the application router around a shared runner
pub fn router(runner: Arc<Runner>) -> Router {
    let server = &runner.config().server;
    let cors = cors_layer(&server.allowed_origins);
    let body_limit = DefaultBodyLimit::max(server.max_body_bytes);

    Router::new()
        .route(EXECUTE_PATH, post(execute))
        .route(EXECUTE_ALIAS, post(execute))
        .route(HEALTH_PATH, get(health))
        .fallback(not_found)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(runner)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn execute(
    State(runner): State<Arc<Runner>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            debug!(error = %rejection, "unreadable request body");
            ApiError::InvalidRequest(IntakeError::Malformed)
        }
    })?;

    let request = parse_request(&body)?;
    let report = runner.submit(request.code).await?;

    Ok(Json(ExecuteResponse::from(&report)))
}

/// An empty body reads as a request without code
fn parse_request(body: &[u8]) -> Result<ExecuteRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExecuteRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "malformed request body");
        ApiError::InvalidRequest(IntakeError::Malformed)
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(runner: Arc<Runner>, addr: SocketAddr, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(Arc::clone(&runner)))
        .with_graceful_shutdown(shutdown)
        .await?;

    runner.pool().close();
    info!("server shut down");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
