use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::hasher;
use crate::state::State as ServiceState;

/// With `hash` set the text is checked against it, otherwise it is hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasherRequest {
    pub text: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub hashcost: Option<u32>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<HasherRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    if let Some(hash) = req.hash.filter(|h| !h.is_empty()) {
        let matches = hasher::verify(&req.text, &hash).await?;
        return Ok(Json(serde_json::json!({ "result": matches })));
    }

    let cost = req.hashcost.unwrap_or(state.minioth().hash_cost());
    if !(4..=31).contains(&cost) {
        return Err(IdentityError::BadInput(format!(
            "hashcost must be between 4 and 31, got {}",
            cost
        )));
    }
    let hashed = hasher::hash(&req.text, cost).await?;
    Ok(Json(serde_json::json!({ "result": hashed })))
}
