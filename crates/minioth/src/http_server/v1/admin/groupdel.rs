use axum::extract::{Extension, Json, Query, State};
use axum::response::IntoResponse;
use common::auth::Caller;
use serde::Deserialize;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Deserialize)]
pub struct GroupdelQuery {
    pub gid: u32,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Query(query): Query<GroupdelQuery>,
) -> Result<impl IntoResponse, IdentityError> {
    tracing::info!("GROUPDEL: {} deleting gid {}", caller.actor(), query.gid);

    let result = state.minioth().groupdel(query.gid).await;
    super::audited(&state, &caller, ip, "groupdel", query.gid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("Group {} deleted.", query.gid),
    })))
}
