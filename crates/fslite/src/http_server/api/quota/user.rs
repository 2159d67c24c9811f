use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use store::models::{SliceFilter, UserVolumePatch};

use crate::http_server::api::ApiError;
use crate::ServiceState;

/// Comma-separated id lists; both empty selects every row.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserVolumesQuery {
    #[serde(default)]
    pub uids: Option<String>,
    #[serde(default)]
    pub vids: Option<String>,
}

impl UserVolumesQuery {
    fn filter(&self) -> Result<SliceFilter, ApiError> {
        Ok(SliceFilter::parse(self.vids.as_deref(), self.uids.as_deref())?)
    }
}

pub async fn list(
    State(state): State<ServiceState>,
    Query(query): Query<UserVolumesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store().select_user_volumes(&query.filter()?).await?;
    Ok(Json(serde_json::json!({ "content": rows })))
}

pub async fn update(
    State(state): State<ServiceState>,
    Json(patch): Json<UserVolumePatch>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("PATCH USER VOLUME: vid {} uid {}", patch.vid, patch.uid);
    let row = state.store().patch_user_volume(&patch).await?;
    Ok(Json(serde_json::json!({ "content": row })))
}

pub async fn remove(
    State(state): State<ServiceState>,
    Query(query): Query<UserVolumesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.store().delete_user_volumes(&query.filter()?).await?;
    tracing::info!("DELETE USER VOLUMES: {} row(s)", deleted);
    Ok(Json(serde_json::json!({
        "status": format!("deleted {} user volume(s)", deleted),
    })))
}
