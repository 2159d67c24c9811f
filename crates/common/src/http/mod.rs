//! HTTP helpers shared by both services.

pub mod health;
mod not_found;

use axum::response::{IntoResponse, Response};
use axum::Json;

pub use not_found::not_found_handler;

use crate::error::ErrorKind;

/// Maximum upload size in bytes (500 MB)
pub const MAX_UPLOAD_SIZE_BYTES: usize = 500 * 1024 * 1024;

/// Maps an error kind and short message to a `{"error": msg}` response.
///
/// Storage failures never leak their message; callers log the details before
/// handing the error over.
pub fn error_response(kind: ErrorKind, msg: impl Into<String>) -> Response {
    let msg = match kind {
        ErrorKind::Storage => "internal storage error".to_string(),
        _ => msg.into(),
    };
    (kind.status(), Json(serde_json::json!({ "error": msg }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_message_is_hidden() {
        let response = error_response(ErrorKind::Storage, "disk exploded at /var/lib");
        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);

        let response = error_response(ErrorKind::AlreadyExists, "already exists");
        assert_eq!(response.status(), http::StatusCode::CONFLICT);
    }
}
