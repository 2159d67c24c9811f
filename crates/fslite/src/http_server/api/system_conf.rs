use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::ServiceState;

/// Runtime configuration minus every secret.
#[derive(Debug, Clone, Serialize)]
pub struct SystemConf {
    pub listen_addr: String,
    pub debug: bool,
    pub locality: bool,
    pub volumes_path: String,
    pub default_volume: String,
    pub default_volume_cap_gb: f64,
    pub max_volume_cap_gb: f64,
    pub jwt_validity_secs: u64,
    pub jwks_path: Option<String>,
    pub minioth_url: Option<String>,
    pub service_secret_enabled: bool,
    pub version: String,
}

pub async fn handler(State(state): State<ServiceState>) -> impl IntoResponse {
    let config = state.config();
    Json(SystemConf {
        listen_addr: config.listen_addr.to_string(),
        debug: config.debug,
        locality: config.locality,
        volumes_path: config.volumes_path.display().to_string(),
        default_volume: config.default_volume.clone(),
        default_volume_cap_gb: config.default_volume_cap_gb,
        max_volume_cap_gb: config.max_volume_cap_gb,
        jwt_validity_secs: config.jwt_validity.as_secs(),
        jwks_path: config.jwks_path.as_ref().map(|p| p.display().to_string()),
        minioth_url: config.minioth_url.as_ref().map(|u| u.to_string()),
        service_secret_enabled: config.service_secret.is_some(),
        version: common::version::build_info().to_string(),
    })
}
