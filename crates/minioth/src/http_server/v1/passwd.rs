use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswdRequest {
    /// Defaults to the caller.
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(req): Json<PasswdRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let target = match (&req.username, caller.principal()) {
        (Some(name), _) if !name.is_empty() => name.clone(),
        (_, Some(principal)) => principal.username.clone(),
        _ => return Err(IdentityError::BadInput("username is required".into())),
    };
    tracing::info!("PASSWD: {} changing password of '{}'", caller.actor(), target);

    if !super::may_act_on(&caller, &target) {
        return Err(IdentityError::Forbidden(
            "cannot change another user's password".into(),
        ));
    }

    let result = state.minioth().passwd(&target, &req.password).await;
    state
        .audit()
        .record(
            AuditEntry::new("passwd", &caller.actor(), &target)
                .from_ip(ip)
                .outcome(&result),
        )
        .await;
    result?;

    Ok(Json(serde_json::json!({"status": "password changed successfully"})))
}
