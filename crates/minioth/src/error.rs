//! Error types for the identity core.

use common::auth::TokenError;
use common::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Validation failure or malformed request
    #[error("{0}")]
    BadInput(String),

    /// Unknown user or wrong password
    #[error("invalid credentials")]
    BadCredentials,

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A selection matched nothing
    #[error("empty")]
    Empty,

    /// Protected target, e.g. deleting root
    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::BadInput(_) => ErrorKind::BadInput,
            IdentityError::BadCredentials => ErrorKind::Unauthorized,
            IdentityError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            IdentityError::NotFound(_) => ErrorKind::NotFound,
            IdentityError::Empty => ErrorKind::Empty,
            IdentityError::Forbidden(_) => ErrorKind::Forbidden,
            IdentityError::Token(e) => e.kind(),
            IdentityError::Database(_)
            | IdentityError::Io(_)
            | IdentityError::Hash(_)
            | IdentityError::Corrupt(_) => ErrorKind::Storage,
        }
    }

    /// Map a unique-constraint violation onto `AlreadyExists(what)`.
    pub(crate) fn unique(e: sqlx::Error, what: impl Into<String>) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => IdentityError::AlreadyExists(what.into()),
            _ => IdentityError::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
