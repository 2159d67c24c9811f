//! Minioth: users, groups and credentials behind a small REST surface,
//! issuing HS256 and RS256 tokens that FsLite verifies.
//!
//! Identity rows live in SQLite ([`backend::SqlBackend`]) or in
//! passwd/shadow/group style files ([`backend::PlainBackend`]). RS256 public
//! keys are published as a JWKS document so other services can verify tokens
//! without the private keys.

pub mod audit;
pub mod backend;
mod error;
pub mod hasher;
pub mod http_server;
mod minioth;
pub mod models;
pub mod process;
pub mod service_config;
mod state;
pub mod token;
pub mod validate;

pub use error::{IdentityError, Result};
pub use minioth::Minioth;
pub use process::{spawn_service, start_service};
pub use service_config::Config as ServiceConfig;
pub use state::{State as ServiceState, StateError};
