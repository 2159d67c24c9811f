use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;

use crate::error::IdentityError;
use crate::models::GroupFilter;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Query(filter): Query<GroupFilter>,
) -> Result<impl IntoResponse, IdentityError> {
    let groups = state.minioth().groups(&filter).await?;
    Ok(Json(serde_json::json!({ "content": groups })))
}
