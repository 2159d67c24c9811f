use axum::routing::{delete, get, post};
use axum::Router;

pub mod get;
pub mod new;
pub mod remove;

use crate::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/new", post(new::handler))
        .route("/delete", delete(remove::handler))
        .route("/get", get(get::handler))
}
