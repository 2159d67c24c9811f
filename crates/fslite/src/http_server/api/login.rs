use axum::extract::{Json, Query, State};
use axum::response::{IntoResponse, Response};
use common::auth::TokenError;
use common::error::ErrorKind;
use common::http::error_response;
use serde::{Deserialize, Serialize};
use store::models::Admin;
use store::StoreError;

use crate::ServiceState;

/// Credentials arrive either as query parameters or as a JSON body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<LoginRequest>,
    body: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, LoginError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let username = query.username.or(body.username).unwrap_or_default();
    let password = query.password.or(body.password).unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(LoginError::Missing);
    }

    tracing::info!("ADMIN LOGIN: attempt for '{}'", username);
    let admin = Admin::authenticate(&username, &password, state.store().database())
        .await?
        .ok_or(LoginError::BadCredentials)?;
    let token = state.admin_tokens().issue(&admin)?;

    tracing::info!("ADMIN LOGIN: '{}' logged in", admin.username);
    Ok(Json(LoginResponse { token }))
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("username and password are required")]
    Missing,
    #[error("invalid credentials")]
    BadCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let kind = match &self {
            LoginError::Missing => ErrorKind::BadInput,
            LoginError::BadCredentials => ErrorKind::Unauthorized,
            LoginError::Store(e) => e.kind(),
            LoginError::Token(e) => e.kind(),
        };
        if kind == ErrorKind::Storage {
            tracing::error!("ADMIN LOGIN ERROR: {}", self);
        } else {
            tracing::warn!("ADMIN LOGIN: {}", self);
        }
        error_response(kind, self.to_string())
    }
}
