use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;
use store::parse_location;

use crate::http_server::api::ApiError;
use crate::ServiceState;

/// `?resource=<vol>/<name>&name=<new name>`
#[derive(Debug, Deserialize)]
pub struct RenameQuery {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub name: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<RenameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (vname, name) = parse_location(&query.resource)?;
    let who = caller.effective_identity();
    let renamed = state
        .store()
        .rename(vname, name, &query.name, who.as_ref())
        .await?;

    tracing::info!(
        "RENAME RESOURCE: {} -> {}",
        query.resource,
        renamed.location()
    );
    Ok(Json(serde_json::json!({ "content": renamed })))
}
