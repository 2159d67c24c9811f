use axum::extract::{Extension, Json, State};
use axum::response::{IntoResponse, Response};
use common::auth::{Caller, TokenError};
use common::http::error_response;

use crate::audit::AuditEntry;
use crate::http_server::SourceIp;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
) -> Result<impl IntoResponse, RotateError> {
    tracing::info!("ROTATE KEY: requested by {}", caller.actor());

    let result = state.tokens().rotate().await;
    let entry = AuditEntry::new("rotate", &caller.actor(), "signing-key").from_ip(ip);
    let entry = match &result {
        Ok(kid) => entry.details(kid.clone()),
        Err(e) => entry.failed(e.to_string()),
    };
    state.audit().record(entry).await;
    let kid = result?;

    tracing::info!("ROTATE KEY: {} is now active", kid);
    Ok(Json(serde_json::json!({
        "message": "signing key rotated",
        "kid": kid,
    })))
}

#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error("failed to rotate signing key: {0}")]
    Token(#[from] TokenError),
}

impl IntoResponse for RotateError {
    fn into_response(self) -> Response {
        tracing::error!("ROTATE KEY ERROR: {}", self);
        match self {
            RotateError::Token(e) => error_response(e.kind(), e.to_string()),
        }
    }
}
