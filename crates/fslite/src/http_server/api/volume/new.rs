use axum::extract::{Json, State};
use axum::response::IntoResponse;
use store::models::NewVolume;

use crate::http_server::api::ApiError;
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<NewVolume>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("NEW VOLUME: '{}' ({:?} GB)", req.name, req.capacity);
    let volume = state.store().create_volume(req).await?;

    tracing::info!(
        "NEW VOLUME: created '{}' with vid {} and capacity {}",
        volume.name,
        volume.vid,
        volume.capacity
    );
    Ok(Json(serde_json::json!({
        "message": "volume created",
        "vid": volume.vid,
    })))
}
