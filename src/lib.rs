use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{LocalFileStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document generated from the `#[utoipa::path]` handlers and `ToSchema`
/// models, served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::init_admin, handlers::create_user,
        handlers::list_exhibits, handlers::get_exhibit, handlers::create_exhibit,
        handlers::update_exhibit, handlers::delete_exhibit, handlers::add_exhibit_images,
        handlers::list_articles, handlers::get_article, handlers::create_article,
        handlers::update_article, handlers::delete_article, handlers::add_article_images,
    ),
    components(
        schemas(
            models::Role, models::UserOut, models::Exhibit, models::ExhibitImage,
            models::Article, models::ArticleImage, models::LoginForm,
            models::CreateUserRequest, models::UpdateExhibitRequest,
            models::UpdateArticleRequest, models::ExhibitUpload, models::ArticleUpload,
            models::GalleryUpload, models::TokenResponse, models::MessageResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "museum-catalog", description = "Museum digital catalog API")
    )
)]
struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single immutable container of everything a request needs: persistence, file
/// intake, configuration and the token service. Cloned per request (all members are
/// cheap handles).
#[derive(Clone)]
pub struct AppState {
    /// Credential and content store.
    pub repo: RepositoryState,
    /// File intake for uploaded images and models.
    pub storage: StorageState,
    pub config: AppConfig,
    pub tokens: TokenService,
}

impl AppState {
    /// Assembles the state, deriving the token service from the configuration.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let tokens = TokenService::from_config(&config);
        Self {
            repo,
            storage,
            config,
            tokens,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 before it reaches a handler unless the `AuthUser`
/// extractor resolves a valid identity.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, scoped middleware, static file serving and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let static_files = ServeDir::new(&state.config.upload_dir);
    let public_prefix = state.config.public_prefix.clone();
    let body_limit = state.config.max_upload_bytes;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Authenticated and admin routes both sit behind the auth layer; the admin
        // role itself is checked inside the handlers.
        .merge(
            authenticated::authenticated_routes()
                .merge(admin::admin_routes())
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .nest_service(&public_prefix, static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span carrying method, URI and the generated `x-request-id`,
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
