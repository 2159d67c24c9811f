use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::RegisterRequest;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let username = req.user.username.clone();
    tracing::info!("USERADD: {} adding '{}'", caller.actor(), username);

    let result = state.minioth().useradd(req.user).await;
    let (uid, pgroup) = super::audited(&state, &caller, ip, "useradd", username, result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("User {} added.", uid),
        "uid": uid,
        "pgroup": pgroup,
    })))
}
