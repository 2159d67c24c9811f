use axum::extract::{Extension, Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use common::auth::Caller;
use common::error::ErrorKind;
use common::http::error_response;
use serde::Deserialize;
use store::{Owner, Upload};

use super::with_timeout;
use crate::http_server::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub volume: String,
    /// Owner; defaults to the caller
    #[serde(default)]
    pub uid: Option<i64>,
    /// Group; defaults to the owner's personal group
    #[serde(default)]
    pub gid: Option<i64>,
}

/// Who an upload is charged to when the query does not say.
fn default_uid(caller: &Caller) -> i64 {
    caller
        .effective_identity()
        .map(|identity| i64::from(identity.uid))
        .unwrap_or(0)
}

/// Each `files` part becomes one resource; the first failure stops the
/// upload, earlier parts stay stored.
pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, UploadError> {
    if query.volume.is_empty() {
        return Err(UploadError::InvalidRequest("must specify volume".into()));
    }
    let uid = query.uid.unwrap_or_else(|| default_uid(&caller));
    let owner = Owner {
        uid,
        gid: query.gid.unwrap_or(uid),
    };

    let mut files: Vec<(String, Bytes)> = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("UPLOAD RESOURCE: multipart parsing error: {}", e);
        UploadError::Multipart(e.to_string())
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "files" | "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| UploadError::InvalidRequest("file part without a filename".into()))?;
                let data = field.bytes().await.map_err(|e| {
                    tracing::error!("UPLOAD RESOURCE: error reading {}: {}", filename, e);
                    UploadError::Multipart(e.to_string())
                })?;
                files.push((filename, data));
            }
            _ => tracing::warn!("UPLOAD RESOURCE: ignoring unknown field: {}", field_name),
        }
    }

    if files.is_empty() {
        return Err(UploadError::InvalidRequest(
            "at least one file is required".into(),
        ));
    }

    tracing::info!(
        "UPLOAD RESOURCE: {} file(s) to '{}' for uid {} by {}",
        files.len(),
        query.volume,
        owner.uid,
        caller.actor()
    );
    for (name, data) in files {
        let size = data.len();
        let upload = Upload {
            vname: query.volume.clone(),
            name,
            owner,
        };
        let resource = with_timeout(state.store().insert(upload, data)).await?;
        tracing::info!(
            "UPLOAD RESOURCE: stored {} ({} bytes, rid {})",
            resource.location(),
            size,
            resource.rid
        );
    }

    Ok(Json(serde_json::json!({ "message": "file/s uploaded." })))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("multipart error: {0}")]
    Multipart(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::InvalidRequest(msg) | UploadError::Multipart(msg) => {
                error_response(ErrorKind::BadInput, msg)
            }
            UploadError::Api(e) => e.into_response(),
        }
    }
}
