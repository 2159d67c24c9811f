use axum::extract::{Extension, Json, Query, State};
use axum::response::IntoResponse;
use common::auth::Caller;
use serde::Deserialize;

use crate::error::IdentityError;
use crate::http_server::SourceIp;
use crate::state::State as ServiceState;

#[derive(Debug, Clone, Deserialize)]
pub struct UserdelQuery {
    pub uid: u32,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    SourceIp(ip): SourceIp,
    Query(query): Query<UserdelQuery>,
) -> Result<impl IntoResponse, IdentityError> {
    tracing::info!("USERDEL: {} deleting uid {}", caller.actor(), query.uid);

    let result = state.minioth().userdel(query.uid).await;
    super::audited(&state, &caller, ip, "userdel", query.uid.to_string(), result).await?;

    Ok(Json(serde_json::json!({
        "message": format!("User {} deleted.", query.uid),
    })))
}
