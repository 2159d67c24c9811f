use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub rid: i64,
    pub gid: i64,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<GroupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let who = caller.effective_identity();
    let resource = state
        .store()
        .chgroup(query.rid, query.gid, who.as_ref())
        .await?;
    tracing::info!("CHGRP: {} -> gid {}", resource.location(), resource.gid);
    Ok(Json(serde_json::json!({ "content": resource })))
}
