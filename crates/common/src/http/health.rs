//! Liveness, readiness and version checks mounted under `/_status`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::time::timeout;

use crate::version::build_info;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait::async_trait]
pub trait DataSource {
    /// Perform various checks on the system to ensure its healthy and ready to accept requests.
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("one or more dependent services aren't available")]
    DependencyFailure,

    #[error("service has received signal indicating it should shutdown")]
    ShuttingDown,
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

pub fn router<S>(source: DynDataSource) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/livez", get(liveness))
        .route("/readyz", get(readiness))
        .route("/version", get(version))
        .layer(Extension(source))
}

/// `GET /health` on both services.
pub async fn alive() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "alive"}))).into_response()
}

async fn liveness() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

async fn version() -> Response {
    (StatusCode::OK, Json(build_info())).into_response()
}

#[tracing::instrument(skip(source))]
pub async fn readiness(Extension(source): Extension<DynDataSource>) -> Response {
    match timeout(HEALTH_CHECK_TIMEOUT, source.is_ready()).await {
        Ok(Ok(())) => {
            let msg = serde_json::json!({"status": "ok"});
            (StatusCode::OK, Json(msg)).into_response()
        }
        Ok(Err(e)) => {
            let message = match e {
                DataSourceError::DependencyFailure => "one or more dependencies aren't available",
                DataSourceError::ShuttingDown => "service is shutting down",
            };
            let msg = serde_json::json!({"status": "failure", "message": message});
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
        Err(_) => {
            let msg = serde_json::json!({
                "status": "failure",
                "message": "health check timed out"
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum MockReadiness {
        DependencyFailure,
        Ready,
        ShuttingDown,
    }

    #[async_trait::async_trait]
    impl DataSource for MockReadiness {
        async fn is_ready(&self) -> Result<(), DataSourceError> {
            match self {
                MockReadiness::DependencyFailure => Err(DataSourceError::DependencyFailure),
                MockReadiness::Ready => Ok(()),
                MockReadiness::ShuttingDown => Err(DataSourceError::ShuttingDown),
            }
        }
    }

    async fn ready_status(mock: MockReadiness) -> StatusCode {
        let source: DynDataSource = Arc::new(mock);
        readiness(Extension(source)).await.status()
    }

    #[tokio::test]
    async fn test_readiness_direct() {
        assert_eq!(ready_status(MockReadiness::Ready).await, StatusCode::OK);
        assert_eq!(
            ready_status(MockReadiness::DependencyFailure).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ready_status(MockReadiness::ShuttingDown).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
