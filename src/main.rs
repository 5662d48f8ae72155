//! EvalTrack Backend
//!
//! Local data backend for the EvalTrack staff evaluation tracker: a SQLite
//! record store fronted by a single-owner storage worker and a reactive
//! sync snapshot.

mod api;
mod config;
mod errors;
mod facade;
mod models;
mod policy;
mod stats;
mod store;
mod sync;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use facade::DatabaseFacade;
use store::RecordStore;
use sync::{ChangeHub, DataSyncStore};
use worker::FlushPolicy;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: DatabaseFacade,
    pub sync: Arc<DataSyncStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EvalTrack Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize the record store
    let pool = store::init_store(&config.db_path).await?;
    let record_store = RecordStore::new(pool);

    // Spawn the storage worker
    let policy = FlushPolicy {
        debounce: Duration::from_millis(config.debounce_ms),
        max_interval: Duration::from_millis(config.flush_interval_ms),
    };
    let handle = worker::spawn(record_store.clone(), policy).await?;

    // Wire the facade and the sync store
    let hub = ChangeHub::new();
    let facade = DatabaseFacade::new(handle, record_store.clone(), hub.publisher());
    let sync = DataSyncStore::start(
        facade.clone(),
        record_store,
        &hub,
        Duration::from_millis(config.resync_settle_ms),
    );

    // Prime the snapshot before serving
    sync.refresh().await;

    // Create application state
    let state = AppState { facade, sync };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Datastore
        .route("/datastore", get(api::get_datastore))
        .route("/datastore", put(api::put_datastore))
        .route("/datastore/revision", get(api::get_revision))
        // Staff
        .route("/staff", get(api::list_staff))
        .route("/staff", post(api::create_staff))
        .route("/staff/{id}", get(api::get_staff_member))
        .route("/staff/{id}", put(api::update_staff))
        .route("/staff/{id}", delete(api::delete_staff))
        // Themes
        .route("/themes", get(api::list_themes))
        .route("/themes", post(api::create_theme))
        .route("/themes/{id}", put(api::update_theme))
        .route("/themes/{id}", delete(api::delete_theme))
        // Evaluations
        .route("/evaluations", get(api::list_evaluations))
        .route("/evaluations", post(api::create_evaluation))
        .route("/evaluations/{id}", get(api::get_evaluation))
        .route("/evaluations/{id}", put(api::update_evaluation))
        .route("/evaluations/{id}", delete(api::delete_evaluation))
        // Stats
        .route("/stats", get(api::get_stats))
        // Sync
        .route("/sync/status", get(api::sync_status))
        .route("/sync/refresh", post(api::sync_refresh))
        // Storage bridge
        .route("/storage/message", post(api::storage_message));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
