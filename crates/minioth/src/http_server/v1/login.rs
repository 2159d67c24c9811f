use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::auth::TokenError;
use common::http::error_response;

use crate::audit::AuditEntry;
use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::User;
use crate::state::State as ServiceState;
use crate::token::{requested_algorithm, SIGNING_ALG_HEADER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: u32,
    pub username: String,
    /// comma-joined group names
    pub groups: String,
    /// comma-joined gids
    pub group_ids: String,
    pub pgroup: u32,
    pub user: User,
}

pub async fn handler(
    State(state): State<ServiceState>,
    SourceIp(ip): SourceIp,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, LoginError> {
    tracing::info!("LOGIN: attempt for '{}'", req.username);
    let alg = requested_algorithm(
        headers
            .get(SIGNING_ALG_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    let result = state.minioth().authenticate(&req.username, &req.password).await;
    state
        .audit()
        .record(
            AuditEntry::new("login", &req.username, &req.username)
                .from_ip(ip)
                .outcome(&result),
        )
        .await;
    let user = result?;

    let access_token = state.tokens().issue_access(&user, alg)?;
    let refresh_token = state.tokens().issue_refresh(&user)?;

    tracing::info!("LOGIN: '{}' logged in ({:?})", user.username, alg);
    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user_id: user.uid,
        username: user.username.clone(),
        groups: user.group_names(),
        group_ids: user.group_ids(),
        pgroup: user.pgroup,
        user,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            LoginError::Identity(e) => e.into_response(),
            LoginError::Token(e) => {
                tracing::error!("LOGIN ERROR: failed to issue tokens: {}", e);
                error_response(e.kind(), e.to_string())
            }
        }
    }
}
