use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Content management endpoints. The router is wrapped in the auth layer by
/// `create_router`, so every handler here receives a validated `AuthUser`.
///
/// Any role (admin, moderator, user) may mutate any exhibit or article; there is no
/// ownership check on update or delete.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Exhibits ---
        // POST /exhibits/
        // Multipart: title, description, photo, model, optional article_id and images.
        .route("/exhibits", post(handlers::create_exhibit))
        .route("/exhibits/", post(handlers::create_exhibit))
        // PUT/DELETE /exhibits/{id}
        // Title/description edits and cascade delete.
        .route(
            "/exhibits/{id}",
            put(handlers::update_exhibit).delete(handlers::delete_exhibit),
        )
        // POST /exhibits/{id}/images
        // Appends gallery images after creation.
        .route("/exhibits/{id}/images", post(handlers::add_exhibit_images))
        // --- Articles ---
        // POST /articles/
        // Multipart: title, content, preview, main_image, optional images.
        .route("/articles", post(handlers::create_article))
        .route("/articles/", post(handlers::create_article))
        .route(
            "/articles/{id}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
        .route("/articles/{id}/images", post(handlers::add_article_images))
}
