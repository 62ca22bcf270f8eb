use campus_clubs::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the store (running migrations),
/// prepares the upload directories and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_clubs=debug,tower_http=info".into());

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

    // 3. Persistence
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.migrate()
                .await
                .expect("FATAL: Failed to run database migrations.");
            tracing::info!("Connected to Postgres, migrations applied.");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store. Data is lost on exit.");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Upload storage
    let disk = LocalDiskStorage::new(&config.upload_dir);
    disk.ensure_dirs()
        .await
        .expect("FATAL: Failed to create upload directories. Check UPLOAD_DIR.");
    let storage: StorageState = Arc::new(disk);

    // 5. Router and server
    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("FATAL: Failed to bind {addr}: {err}"));

    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", err);
    }
}
