use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use serde::Deserialize;
use store::parse_location;

use super::with_timeout;
use crate::http_server::api::ApiError;
use crate::ServiceState;

/// `?source=<vol>/<name>&dest=<vol>/<name>`
#[derive(Debug, Deserialize)]
pub struct CopyQuery {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub dest: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<CopyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let src = parse_location(&query.source)?;
    let dst = parse_location(&query.dest)?;
    let who = caller.effective_identity();

    tracing::info!(
        "COPY RESOURCE: {} -> {} by {}",
        query.source,
        query.dest,
        caller.actor()
    );
    let copied = with_timeout(state.store().copy(src, dst, who.as_ref())).await?;

    Ok(Json(serde_json::json!({
        "message": "copy complete",
        "rid": copied.rid,
    })))
}
