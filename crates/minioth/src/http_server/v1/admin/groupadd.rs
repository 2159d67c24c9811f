use axum::extract::{Extension, Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::models::NewGroup;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Json(group): Json<NewGroup>,
) -> Result<impl IntoResponse, IdentityError> {
    let name = group.groupname.clone();
    tracing::info!("GROUPADD: {} adding '{}'", caller.actor(), name);

    let result = state.minioth().groupadd(group).await;
    let gid = super::audited(&state, &caller, ip, "groupadd", name, result).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Group added successfully",
            "gid": gid,
        })),
    ))
}
