use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use common::auth::{bearer_token, TokenError};
use common::error::ErrorKind;
use common::http::error_response;
use serde::{Deserialize, Serialize};

use crate::state::State as ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub valid: bool,
    pub user_id: String,
    pub username: String,
    pub groups: String,
    pub group_ids: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, TokenInfoError> {
    let token = bearer_token(&headers).ok_or(TokenInfoError::Missing)?;
    let (claims, _) = state.tokens().parse_any(token)?;

    Ok(Json(serde_json::json!({
        "info": TokenInfo {
            valid: true,
            user_id: claims.sub,
            username: claims.username,
            groups: claims.groups,
            group_ids: claims.group_ids,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    })))
}

#[derive(Debug, thiserror::Error)]
pub enum TokenInfoError {
    #[error("Authorization header is required")]
    Missing,
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
}

impl IntoResponse for TokenInfoError {
    fn into_response(self) -> Response {
        tracing::warn!("TOKEN INFO: {}", self);
        let kind = match &self {
            TokenInfoError::Missing => ErrorKind::Unauthorized,
            TokenInfoError::Token(e) => e.kind(),
        };
        error_response(kind, self.to_string())
    }
}
