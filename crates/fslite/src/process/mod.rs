use common::process::{graceful_shutdown_blocker, init_logging, ShutdownHandle};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

/// Create state from config, exiting on error.
async fn create_state(config: &ServiceConfig) -> ServiceState {
    match ServiceState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(1);
        }
    }
}

/// Create state and spawn the HTTP server, returning the state handle.
pub async fn start_service(config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (graceful_waiter, shutdown_tx, shutdown_rx) = match graceful_shutdown_blocker() {
        Ok(blocker) => blocker,
        Err(e) => {
            tracing::error!("failed to install signal handlers: {}", e);
            std::process::exit(1);
        }
    };
    let state = create_state(config).await;

    let http_config = http_server::Config::new(config.listen_addr, config.log_level);
    let http_state = state.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server::run_api(http_config, http_state, shutdown_rx).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("Running: fslite on {}", config.listen_addr);

    let handle = ShutdownHandle::new(graceful_waiter, vec![http_handle], shutdown_tx);
    (state, handle)
}

/// Runs fslite until a shutdown signal is received. The metadata pool is
/// closed only after the listener has stopped.
pub async fn spawn_service(config: &ServiceConfig) {
    let _guards = init_logging("fslite", config.log_level, config.log_dir.as_deref());
    let (state, handle) = start_service(config).await;
    let clean = handle.wait().await;

    state.store().database().close().await;
    tracing::info!("metadata pool closed");
    if !clean {
        std::process::exit(1);
    }
}
