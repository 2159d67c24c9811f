use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use store::models::{GroupVolumePatch, SliceFilter};

use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupVolumesQuery {
    #[serde(default)]
    pub gids: Option<String>,
    #[serde(default)]
    pub vids: Option<String>,
}

fn filter(query: &GroupVolumesQuery) -> Result<SliceFilter, ApiError> {
    Ok(SliceFilter::parse(query.vids.as_deref(), query.gids.as_deref())?)
}

pub async fn list(
    State(state): State<ServiceState>,
    Query(query): Query<GroupVolumesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store().select_group_volumes(&filter(&query)?).await?;
    Ok(Json(serde_json::json!({ "content": rows })))
}

/// Provisioning a group row makes claims by that group count against it.
pub async fn update(
    State(state): State<ServiceState>,
    Json(patch): Json<GroupVolumePatch>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("PATCH GROUP VOLUME: vid {} gid {}", patch.vid, patch.gid);
    let row = state.store().patch_group_volume(&patch).await?;
    Ok(Json(serde_json::json!({ "content": row })))
}

pub async fn remove(
    State(state): State<ServiceState>,
    Query(query): Query<GroupVolumesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.store().delete_group_volumes(&filter(&query)?).await?;
    tracing::info!("DELETE GROUP VOLUMES: {} row(s)", deleted);
    Ok(Json(serde_json::json!({
        "status": format!("deleted {} group volume(s)", deleted),
    })))
}
