mod config;
mod db;
mod error;
mod handlers;
mod identity;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, StorageProviderKind};
use crate::db::Database;
use crate::identity::IdentityVerifier;
use crate::storage::ImageStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub images: ImageStore,
    pub verifier: Arc<dyn IdentityVerifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daymemo=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DayMemo API...");

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let state = AppState {
        db,
        config: config.clone(),
        images: ImageStore::from_config(&config.storage),
        verifier: identity::verifier_from_config(&config.auth),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let mut public_routes = Router::new().route("/health", get(handlers::health::health));

    // Locally stored images are served straight from disk
    if state.config.storage.provider == StorageProviderKind::Local {
        public_routes = public_routes.nest_service(
            "/images",
            ServeDir::new(&state.config.storage.local_path),
        );
    }

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/memories",
            get(handlers::memory::list_memories).post(handlers::memory::create_memory),
        )
        .route(
            "/memories/:id",
            get(handlers::memory::get_memory)
                .put(handlers::memory::update_memory)
                .delete(handlers::memory::delete_memory),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
