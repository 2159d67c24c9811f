//! Discovery documents, served at the root and under `/v1`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::State as ServiceState;

#[derive(Debug, Serialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
}

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/.well-known/openid-configuration", get(openid_configuration))
        .route("/.well-known/jwks.json", get(jwks))
        .route("/.well-known/minioth", get(banner))
}

async fn openid_configuration(State(state): State<ServiceState>) -> impl IntoResponse {
    let issuer = state.tokens().issuer().trim_end_matches('/').to_string();
    Json(OpenIdConfiguration {
        jwks_uri: format!("{}/.well-known/jwks.json", issuer),
        token_endpoint: format!("{}/v1/login", issuer),
        userinfo_endpoint: format!("{}/v1/user/me", issuer),
        id_token_signing_alg_values_supported: vec!["RS256", "HS256"],
        issuer,
    })
}

async fn jwks(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(state.tokens().jwks())
}

async fn banner() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "minioth",
        "version": common::version::build_info().to_string(),
        "message": "minioth identity provider",
    }))
}
