use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use common::http::{error_response, health, not_found_handler};
use tokio::sync::watch;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

mod config;
pub mod v1;
mod well_known;

pub use config::Config;

use crate::error::IdentityError;
use crate::state::State;

const V1_PREFIX: &str = "/v1";
const STATUS_PREFIX: &str = "/_status";

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The full minioth application, without the tracing layer.
pub fn router(state: State) -> Router {
    let source: health::DynDataSource = Arc::new(state.clone());

    Router::new()
        .nest(V1_PREFIX, v1::router(state.clone()))
        .merge(well_known::router())
        .route("/health", get(health::alive))
        .nest(STATUS_PREFIX, health::router(source))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn run_api(
    config: Config,
    state: State,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let router = router(state)
        .layer(Extension(config.clone()))
        .layer(trace_layer);

    tracing::info!(addr = ?listen_addr, "minioth listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    })
    .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        match self.kind() {
            common::error::ErrorKind::Storage => tracing::error!("IDENTITY ERROR: {}", self),
            _ => tracing::warn!("IDENTITY ERROR: {}", self),
        }
        error_response(self.kind(), self.to_string())
    }
}

/// Client address for audit entries: first `X-Forwarded-For` hop, else the
/// peer address.
#[derive(Debug, Clone)]
pub struct SourceIp(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SourceIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        let ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Ok(SourceIp(ip))
    }
}
