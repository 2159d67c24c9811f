//! Identity administration, gated on the `admin` group.

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use common::auth::{authorize, Caller};

pub mod audit_logs;
pub mod groupadd;
pub mod groupdel;
pub mod groupmod;
pub mod grouppatch;
pub mod groups;
pub mod hasher;
pub mod rotate;
pub mod useradd;
pub mod userdel;
pub mod usermod;
pub mod userpatch;
pub mod users;
pub mod verify_password;

use crate::audit::AuditEntry;
use crate::error::IdentityError;
use crate::state::State;

pub fn router(state: State) -> Router<State> {
    let admin = state.gate().policy(&["admin"]);

    Router::new()
        .route("/audit/logs", get(audit_logs::handler))
        .route("/hasher", post(hasher::handler))
        .route("/verify-password", post(verify_password::handler))
        .route("/users", get(users::handler))
        .route("/groups", get(groups::handler))
        .route("/useradd", post(useradd::handler))
        .route("/userdel", delete(userdel::handler))
        .route("/userpatch", patch(userpatch::handler))
        .route("/usermod", put(usermod::handler))
        .route("/groupadd", post(groupadd::handler))
        .route("/grouppatch", patch(grouppatch::handler))
        .route("/groupmod", put(groupmod::handler))
        .route("/groupdel", delete(groupdel::handler))
        .route("/rotate", post(rotate::handler))
        .route_layer(from_fn_with_state(admin, authorize))
        .with_state(state)
}

/// Record the outcome of an admin mutation and hand it back.
pub(crate) async fn audited<T>(
    state: &State,
    caller: &Caller,
    ip: String,
    action: &str,
    target: impl Into<String>,
    result: Result<T, IdentityError>,
) -> Result<T, IdentityError> {
    state
        .audit()
        .record(
            AuditEntry::new(action, &caller.actor(), target)
                .from_ip(ip)
                .outcome(&result),
        )
        .await;
    result
}
