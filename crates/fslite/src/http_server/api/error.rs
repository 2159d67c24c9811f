use axum::response::{IntoResponse, Response};
use common::error::ErrorKind;
use common::http::error_response;
use store::StoreError;

/// Failure of a storage handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("operation timed out")]
    Timeout,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Store(e) => e.kind(),
            ApiError::BadRequest(_) => ErrorKind::BadInput,
            ApiError::Timeout => ErrorKind::Storage,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Storage => tracing::error!("STORAGE ERROR: {}", self),
            ErrorKind::Empty | ErrorKind::NotFound => tracing::debug!("STORAGE: {}", self),
            _ => tracing::warn!("STORAGE: {}", self),
        }
        error_response(self.kind(), self.to_string())
    }
}
