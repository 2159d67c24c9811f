use axum::extract::{Extension, Json, State};
use axum::response::IntoResponse;
use common::auth::Caller;

use crate::error::IdentityError;
use crate::state::State as ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, IdentityError> {
    let principal = caller
        .principal()
        .ok_or_else(|| IdentityError::BadInput("no user behind this request".into()))?;
    let user = state.minioth().user(principal.uid).await?;
    Ok(Json(user))
}
