use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Account provisioning. Mounted at the root (not nested) so the paths match the
/// public API contract; the handler rejects non-admin callers with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /users/
        // Creates an account of any role.
        .route("/users", post(handlers::create_user))
        .route("/users/", post(handlers::create_user))
}
