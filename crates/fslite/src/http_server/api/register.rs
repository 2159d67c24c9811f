use axum::extract::{Extension, Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::auth::Caller;
use serde::{Deserialize, Serialize};
use store::models::Admin;

use super::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "REGISTER ADMIN: {} registering '{}'",
        caller.actor(),
        req.username
    );
    let admin = Admin::register(
        &req.username,
        &req.password,
        state.config().hash_cost,
        state.store().database(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "admin registered",
            "uid": admin.uuid,
        })),
    ))
}
