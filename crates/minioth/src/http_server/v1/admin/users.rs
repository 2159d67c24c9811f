use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;

use crate::error::IdentityError;
use crate::models::UserFilter;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Query(filter): Query<UserFilter>,
) -> Result<impl IntoResponse, IdentityError> {
    let users = state.minioth().users(&filter).await?;
    Ok(Json(serde_json::json!({ "content": users })))
}
