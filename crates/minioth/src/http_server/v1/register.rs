use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::RegisterRequest;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub uid: u32,
    pub pgroup: u32,
    pub login_url: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    SourceIp(ip): SourceIp,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let username = req.user.username.clone();
    tracing::info!("REGISTER: Received request to register '{}'", username);

    let result = state.minioth().register(req.user).await;
    state
        .audit()
        .record(
            AuditEntry::new("register", &username, &username)
                .from_ip(ip)
                .outcome(&result),
        )
        .await;
    let (uid, pgroup) = result?;

    tracing::info!("REGISTER: '{}' registered with uid {}", username, uid);
    Ok(Json(RegisterResponse {
        message: "registration successful.".to_string(),
        uid,
        pgroup,
        login_url: "/v1/login".to_string(),
    }))
}
