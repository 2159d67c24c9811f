use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct DeleteResourceQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub volume: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<DeleteResourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.name.is_empty() || query.volume.is_empty() {
        return Err(ApiError::BadRequest(
            "must provide resource name and volume".into(),
        ));
    }
    let who = caller.effective_identity();
    let resource = state
        .store()
        .remove(&query.volume, &query.name, who.as_ref())
        .await?;

    tracing::info!(
        "DELETE RESOURCE: {} ({} bytes released) by {}",
        resource.location(),
        resource.size,
        caller.actor()
    );
    Ok(Json(serde_json::json!({
        "status": format!("{} deleted", resource.location()),
    })))
}
