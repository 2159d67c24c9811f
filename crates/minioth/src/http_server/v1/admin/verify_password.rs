use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPasswordRequest {
    pub username: String,
    pub password: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<VerifyPasswordRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let user = state
        .minioth()
        .authenticate(&req.username, &req.password)
        .await?;
    Ok(Json(serde_json::json!({ "valid": true, "uid": user.uid })))
}
