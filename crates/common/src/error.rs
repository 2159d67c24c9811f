//! Error kinds shared by both services.
//!
//! Every library error enum exposes a `kind()` so the HTTP edge can map
//! failures to status codes in exactly one place ([`crate::http::error_response`]).

use http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    Unauthorized,
    Forbidden,
    NotFound,
    /// A query matched nothing.
    Empty,
    AlreadyExists,
    QuotaExceeded,
    /// The operation needs a payload backend and none is configured.
    NotApplicable,
    Storage,
    BadGateway,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadInput | ErrorKind::QuotaExceeded | ErrorKind::NotApplicable => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound | ErrorKind::Empty => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::BadInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::QuotaExceeded.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Empty.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::AlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::BadGateway.status(), StatusCode::BAD_GATEWAY);
    }
}
