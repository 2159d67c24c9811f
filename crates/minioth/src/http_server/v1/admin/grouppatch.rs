use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::GroupPatch;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(patch): Json<GroupPatch>,
) -> Result<impl IntoResponse, IdentityError> {
    let gid = patch.gid;
    tracing::info!("GROUPPATCH: {} patching gid {}", caller.actor(), gid);

    let result = state.minioth().grouppatch(patch).await;
    super::audited(&state, &caller, ip, "grouppatch", gid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("Group {} patched.", gid),
    })))
}
