use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use common::auth::Caller;
use store::parse_location;

use super::LocationQuery;
use crate::http_server::api::ApiError;
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (vname, name) = parse_location(&query.resource)?;
    let who = caller.effective_identity();
    let stat = state.store().stat(vname, name, who.as_ref()).await?;
    Ok(Json(serde_json::json!({ "content": stat })))
}
