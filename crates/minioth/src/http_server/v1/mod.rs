use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use common::auth::{authorize, Caller};

pub mod admin;
pub mod login;
pub mod me;
pub mod passwd;
pub mod refresh;
pub mod register;
pub mod token_info;

use crate::state::State;

pub fn router(state: State) -> Router<State> {
    let user = state.gate().policy(&[]);

    let gated = Router::new()
        .route("/passwd", post(passwd::handler))
        .route("/user/me", get(me::handler))
        .route_layer(from_fn_with_state(user, authorize));

    Router::new()
        .route("/register", post(register::handler))
        .route("/login", post(login::handler))
        .route("/user/token", get(token_info::handler))
        .route("/user/refresh-token", post(refresh::handler))
        .route("/token/refresh", post(refresh::handler))
        .merge(gated)
        .nest("/admin", admin::router(state.clone()))
        .merge(super::well_known::router())
        .with_state(state)
}

/// Whether `caller` may change the account named `username`.
pub(crate) fn may_act_on(caller: &Caller, username: &str) -> bool {
    match caller {
        Caller::Service { .. } | Caller::Debug => true,
        Caller::User { principal, .. } => principal.is_admin() || principal.username == username,
    }
}
