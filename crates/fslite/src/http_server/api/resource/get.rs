use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use store::models::{parse_ids, ResourceQuery};
use store::StoreError;

use crate::http_server::api::ApiError;
use crate::ServiceState;

/// `?name=<prefix>&rids=1,2&volume=&uid=`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetResourcesQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rids: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub uid: Option<i64>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<GetResourcesQuery>,
) -> Result<Response, ApiError> {
    let filter = ResourceQuery {
        name: query.name.filter(|n| !n.is_empty()),
        rids: parse_ids(query.rids.as_deref())?,
        volume: query.volume.filter(|v| !v.is_empty()),
        uid: query.uid,
    };

    match state.store().select_resources(&filter).await {
        Ok(resources) => Ok(Json(resources).into_response()),
        Err(StoreError::Empty) => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "empty" })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}
