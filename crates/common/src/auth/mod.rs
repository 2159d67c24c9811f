//! Token claims, capability sets, JWKS documents and the authorization gate
//! shared by Minioth and FsLite.

mod capability;
mod claims;
mod gate;
mod jwks;
mod verifier;

pub use capability::CapabilitySet;
pub use claims::{Claims, Identity, Principal, TokenUse};
pub use gate::{
    authorize, bearer_token, AccessTarget, Caller, Gate, Policy, ACCESS_TARGET_HEADER,
    SERVICE_SECRET_HEADER,
};
pub use jwks::{Jwk, JwkSet};
pub use verifier::{decode_claims, declared_algorithm, JwksSource, SharedKeyVerifier, TokenParser};

use crate::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unknown signing key: {0}")]
    UnknownKey(String),
    #[error("wrong token type")]
    WrongUse,
    #[error("jwks error: {0}")]
    Jwks(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("upstream key service unavailable: {0}")]
    Upstream(String),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Jwks(_) | TokenError::Signing(_) => ErrorKind::Storage,
            TokenError::Upstream(_) => ErrorKind::BadGateway,
            _ => ErrorKind::Unauthorized,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as Jwt;
        match e.kind() {
            Jwt::ExpiredSignature => TokenError::Expired,
            Jwt::InvalidSignature => TokenError::InvalidSignature,
            Jwt::InvalidAlgorithm => TokenError::UnsupportedAlgorithm(e.to_string()),
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingToken,
    #[error("invalid service secret")]
    BadServiceSecret,
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
    #[error("insufficient privileges")]
    Forbidden,
    #[error("invalid Access-Target header: {0}")]
    BadAccessTarget(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken | AuthError::BadServiceSecret => ErrorKind::Unauthorized,
            AuthError::Token(e) => e.kind(),
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::BadAccessTarget(_) => ErrorKind::BadInput,
        }
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!("AUTHORIZATION: {}", self);
        crate::http::error_response(self.kind(), self.to_string())
    }
}
