use museum_catalog::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalFileStorage, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the database, the upload directory and the
/// HTTP server, in that order. Any failure during startup aborts the process.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the built-in default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "museum_catalog=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database: pool plus schema migrations.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. File intake: make sure images/ and models/ exist before the first upload.
    let files = LocalFileStorage::new(config.upload_dir.clone(), &config.public_prefix);
    files
        .ensure_dirs()
        .await
        .expect("FATAL: Failed to create the upload directories. Check UPLOAD_DIR.");
    let storage = Arc::new(files) as StorageState;

    // 5. Router and server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, storage, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
