use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::error::IdentityError;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub max: Option<usize>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, IdentityError> {
    let logs = state.audit().tail(query.max).await?;
    Ok(Json(serde_json::json!({ "logs": logs })))
}
