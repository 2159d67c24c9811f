use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::UserPatch;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(patch): Json<UserPatch>,
) -> Result<impl IntoResponse, IdentityError> {
    let uid = patch.uid;
    tracing::info!("USERPATCH: {} patching uid {}", caller.actor(), uid);

    let result = state.minioth().userpatch(patch).await;
    super::audited(&state, &caller, ip, "userpatch", uid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("User {} patched.", uid),
    })))
}
