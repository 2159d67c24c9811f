use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub rid: i64,
    pub uid: i64,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<OwnerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let who = caller.effective_identity();
    let resource = state
        .store()
        .chowner(query.rid, query.uid, who.as_ref())
        .await?;
    tracing::info!("CHOWN: {} -> uid {}", resource.location(), resource.uid);
    Ok(Json(serde_json::json!({ "content": resource })))
}
