use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. Besides login and the admin bootstrap these are all
/// read-only views of the catalog.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and container orchestration.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Form-encoded username/password exchanged for a bearer token.
        .route("/auth/login", post(handlers::login))
        // GET /init-admin
        // Idempotent creation of the first admin account.
        .route("/init-admin", get(handlers::init_admin))
        // GET /exhibits
        // Full, unpaginated catalog listing. Accepted with or without trailing slash.
        .route("/exhibits", get(handlers::list_exhibits))
        .route("/exhibits/", get(handlers::list_exhibits))
        // GET /exhibits/{id}
        // Single exhibit with its ordered gallery; 404 when unknown.
        .route("/exhibits/{id}", get(handlers::get_exhibit))
        // GET /articles, /articles/{id}
        .route("/articles", get(handlers::list_articles))
        .route("/articles/", get(handlers::list_articles))
        .route("/articles/{id}", get(handlers::get_article))
}
