use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::UsermodRequest;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(req): Json<UsermodRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let uid = req.user.uid;
    tracing::info!("USERMOD: {} replacing uid {}", caller.actor(), uid);

    let result = state.minioth().usermod(req.user).await;
    super::audited(&state, &caller, ip, "usermod", uid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("User {} updated.", uid),
    })))
}
