//! Error types for the volume and resource store.

use common::error::ErrorKind;

/// Errors that can occur when working with volumes and resources.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed name, perms string or request shape
    #[error("{0}")]
    BadInput(String),

    /// Unique key already taken
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Row not found by key
    #[error("{0} not found")]
    NotFound(String),

    /// A selection matched nothing
    #[error("empty")]
    Empty,

    /// Volume capacity or quota slice would be exceeded
    #[error("volume claim denied: {0}")]
    QuotaExceeded(String),

    /// POSIX permission bits deny the caller
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// Operation needs a payload backend and none is configured
    #[error("operation not applicable without a payload backend")]
    NotApplicable,

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Password hashing error
    #[error("hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::BadInput(_) | StoreError::InvalidConfig(_) => ErrorKind::BadInput,
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Empty => ErrorKind::Empty,
            StoreError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            StoreError::Forbidden(_) => ErrorKind::Forbidden,
            StoreError::NotApplicable => ErrorKind::NotApplicable,
            StoreError::Database(_)
            | StoreError::ObjectStore(_)
            | StoreError::Io(_)
            | StoreError::Migration(_)
            | StoreError::Hash(_) => ErrorKind::Storage,
        }
    }

    /// Map a unique-constraint violation onto `AlreadyExists(what)`.
    pub(crate) fn unique(e: sqlx::Error, what: impl Into<String>) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::AlreadyExists(what.into()),
            _ => StoreError::Database(e),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
