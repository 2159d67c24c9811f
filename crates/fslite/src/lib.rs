//! FsLite: volumes, resources and quota accounting behind an HTTP edge.

pub mod http_server;
pub mod process;
pub mod service_config;
mod state;

pub use process::{spawn_service, start_service};
pub use service_config::Config as ServiceConfig;
pub use state::{AdminTokens, State as ServiceState, StateSetupError, LOCAL_ISSUER};
