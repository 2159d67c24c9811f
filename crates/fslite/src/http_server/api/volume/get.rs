use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use store::models::Volume;

use crate::http_server::api::client::ApiRequest;
use crate::http_server::api::ApiError;
use crate::ServiceState;

/// `?name=&vid=`; both empty lists every volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
#[serde(deny_unknown_fields)]
pub struct GetVolumesRequest {
    /// Exact volume name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub vid: Option<i64>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Query(query): Query<GetVolumesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = query.name.as_deref().filter(|n| !n.is_empty());
    let volumes = state.store().select_volumes(name, query.vid).await?;
    Ok(Json(volumes))
}

impl ApiRequest for GetVolumesRequest {
    type Response = Vec<Volume>;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let mut url = base_url.clone();
        url.set_path("/volume/get");
        client.get(url).query(&self)
    }
}
