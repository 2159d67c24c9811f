use axum::body::Body;
use axum::extract::{Extension, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use common::auth::Caller;
use store::parse_location;

use super::LocationQuery;
use crate::http_server::api::ApiError;
use crate::ServiceState;

/// Streams the payload; fails with 400 on metadata-only deployments.
pub async fn handler(
    State(state): State<ServiceState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<LocationQuery>,
) -> Result<Response, ApiError> {
    let (vname, name) = parse_location(&query.resource)?;
    let who = caller.effective_identity();

    let (resource, reader) = state.store().download(vname, name, who.as_ref()).await?;
    tracing::info!(
        "DOWNLOAD RESOURCE: {} ({} bytes) by {}",
        resource.location(),
        reader.size,
        caller.actor()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, reader.size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&resource.name),
            ),
        ],
        Body::from_stream(reader.stream),
    )
        .into_response())
}

/// Quoted ASCII fallback plus the exact name as an RFC 5987 `filename*`.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    let mut encoded = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_cannot_break_out_of_quotes() {
        assert_eq!(
            content_disposition("plain.txt"),
            "attachment; filename=\"plain.txt\"; filename*=UTF-8''plain.txt"
        );
        let header = content_disposition("a\";b=\"c.txt");
        assert_eq!(
            header,
            "attachment; filename=\"a_;b=_c.txt\"; filename*=UTF-8''a%22%3Bb%3D%22c.txt"
        );
        assert_eq!(header.matches('"').count(), 2);
        assert_eq!(
            content_disposition("na\u{ef}ve.txt"),
            "attachment; filename=\"na_ve.txt\"; filename*=UTF-8''na%C3%AFve.txt"
        );
    }
}
