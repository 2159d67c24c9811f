//! Resource routes. Reads and writes on behalf of a user principal are
//! checked against the resource's POSIX bits; the service secret and debug
//! mode skip the check.

use std::future::Future;
use std::time::Duration;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use serde::Deserialize;

pub mod copy;
pub mod download;
pub mod get;
pub mod group;
pub mod owner;
pub mod perms;
pub mod remove;
pub mod rename;
pub mod stat;
pub mod upload;

use super::ApiError;
use crate::ServiceState;

/// Bound on payload-moving operations (upload, copy).
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/upload", post(upload::handler))
        .route("/download", get(download::handler))
        .route("/get", get(get::handler))
        .route("/stat", get(stat::handler))
        .route("/delete", delete(remove::handler))
        .route("/copy", post(copy::handler))
        .route("/rename", patch(rename::handler))
        .route("/perms", patch(perms::handler))
        .route("/owner", patch(owner::handler))
        .route("/group", patch(group::handler))
}

/// `?resource=<volume>/<name>`
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub resource: String,
}

pub(crate) async fn with_timeout<T, F>(op: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, store::StoreError>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, op).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::Timeout),
    }
}
