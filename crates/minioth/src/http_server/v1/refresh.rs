use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use common::auth::{TokenError, TokenUse};
use common::http::error_response;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::state::State as ServiceState;
use crate::token::{requested_algorithm, SIGNING_ALG_HEADER};

/// Either token may be presented; a refresh token wins when both are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, RefreshError> {
    let tokens = state.tokens();
    let non_empty = |t: Option<String>| t.filter(|t| !t.trim().is_empty());

    // a refresh token signs with the requested algorithm, an access token
    // keeps its own
    let (claims, alg) = match (non_empty(req.refresh_token), non_empty(req.access_token)) {
        (Some(refresh), _) => {
            let (claims, _) = tokens.parse_any(&refresh)?;
            if claims.token_use != TokenUse::Refresh {
                return Err(TokenError::WrongUse.into());
            }
            let alg = requested_algorithm(
                headers
                    .get(SIGNING_ALG_HEADER)
                    .and_then(|v| v.to_str().ok()),
            );
            (claims, alg)
        }
        (None, Some(access)) => {
            let (claims, alg) = tokens.parse_any(&access)?;
            if claims.token_use != TokenUse::Access {
                return Err(TokenError::WrongUse.into());
            }
            (claims, alg)
        }
        (None, None) => return Err(RefreshError::Missing),
    };

    let uid = claims
        .uid()
        .ok_or_else(|| TokenError::Malformed("non-numeric subject".into()))?;
    // re-read so group changes since the last login are picked up
    let user = state.minioth().user(uid).await?;
    tracing::info!("REFRESH TOKEN: issuing for '{}' ({:?})", user.username, alg);

    Ok(Json(RefreshResponse {
        message: "new access token generated".to_string(),
        access_token: tokens.issue_access(&user, alg)?,
        refresh_token: tokens.issue_refresh(&user)?,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("access_token or refresh_token is required")]
    Missing,
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl IntoResponse for RefreshError {
    fn into_response(self) -> Response {
        match self {
            RefreshError::Missing => {
                error_response(common::error::ErrorKind::BadInput, self.to_string())
            }
            RefreshError::Token(e) => {
                tracing::warn!("REFRESH TOKEN: {}", e);
                error_response(e.kind(), format!("invalid token: {}", e))
            }
            RefreshError::Identity(e) => e.into_response(),
        }
    }
}
