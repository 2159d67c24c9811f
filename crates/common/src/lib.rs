/**
 * Token claims, capability sets, JWKS documents
 *  and the request authorization gate.
 */
pub mod auth;
pub mod error;
/**
 * JSON error bodies, the not-found fallback
 *  and the `/_status` checks.
 */
pub mod http;
/**
 * Logging setup, signal handling and
 *  graceful shutdown of service tasks.
 */
pub mod process;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::auth::{Caller, CapabilitySet, Claims, Gate, Identity, Principal};
    pub use crate::error::ErrorKind;
    pub use crate::http::error_response;
    pub use crate::version::build_info;
}
