use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::GroupUpdate;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(update): Json<GroupUpdate>,
) -> Result<impl IntoResponse, IdentityError> {
    let gid = update.gid;
    tracing::info!("GROUPMOD: {} replacing gid {}", caller.actor(), gid);

    let result = state.minioth().groupmod(update).await;
    super::audited(&state, &caller, ip, "groupmod", gid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("Group {} updated.", gid),
    })))
}
