use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct PermsQuery {
    pub rid: i64,
    /// nine characters of `rwx` or `-`
    pub perms: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<PermsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let who = caller.effective_identity();
    let resource = state
        .store()
        .chperms(query.rid, &query.perms, who.as_ref())
        .await?;
    tracing::info!("CHMOD: {} -> {}", resource.location(), resource.perms.as_str());
    Ok(Json(serde_json::json!({ "content": resource })))
}
