use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct DeleteVolumeQuery {
    #[serde(default)]
    pub name: String,
}

/// Only empty, non-default volumes can be deleted.
pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<DeleteVolumeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.name.is_empty() {
        return Err(ApiError::BadRequest("must provide a volume name".into()));
    }
    tracing::info!("DELETE VOLUME: '{}'", query.name);
    let volume = state.store().remove_volume(&query.name).await?;

    Ok(Json(serde_json::json!({
        "message": "volume deleted",
        "vid": volume.vid,
    })))
}
