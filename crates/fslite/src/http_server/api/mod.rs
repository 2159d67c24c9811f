//! The storage REST surface.
//!
//! Every storage route is gated on the `admin` capability (or the service
//! secret) and served both at the root and under `/admin`. Only `/login` is
//! public.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use common::auth::authorize;

pub mod client;
mod error;
pub mod login;
pub mod quota;
pub mod register;
pub mod resource;
pub mod system_conf;
pub mod volume;

pub use error::ApiError;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let admin_only = Router::new()
        .route("/register", post(register::handler))
        .route("/system-conf", get(system_conf::handler))
        .route_layer(from_fn_with_state(
            state.gate().policy(&["admin"]),
            authorize,
        ));

    Router::new()
        .route("/login", post(login::handler))
        .merge(storage(state.clone()))
        .nest("/admin", storage(state.clone()).merge(admin_only))
        .with_state(state)
}

fn storage(state: ServiceState) -> Router<ServiceState> {
    let policy = state.gate().policy(&["admin"]);

    Router::new()
        .nest("/volume", volume::router())
        .nest("/resource", resource::router())
        .route(
            "/user/volumes",
            get(quota::user::list)
                .patch(quota::user::update)
                .delete(quota::user::remove),
        )
        .route(
            "/group/volumes",
            get(quota::group::list)
                .patch(quota::group::update)
                .delete(quota::group::remove),
        )
        .route_layer(from_fn_with_state(policy, authorize))
}
