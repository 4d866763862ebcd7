//! Movie Shelf Backend
//!
//! A small REST backend where users keep a shelf of movies resolved through
//! the OMDb API. The shelf lives in a JSON document or a SQLite database.

mod api;
mod config;
mod errors;
mod metadata;
mod models;
mod store;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use metadata::{MovieLookup, OmdbClient};
use store::DataManager;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataManager>,
    pub lookup: Arc<dyn MovieLookup>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Movie Shelf Backend");
    tracing::info!("Store backend: {:?}", config.store_backend);
    tracing::info!("Metadata endpoint: {}", config.omdb_base_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.omdb_api_key.is_none() {
        tracing::warn!("No OMDb API key configured (OMDB_API_KEY). Movie lookups will fail!");
    }

    let store = store::open_store(&config).await?;
    let users = store.list_user_names().await?;
    tracing::info!("Store opened with {} users", users.len());

    let lookup = Arc::new(OmdbClient::new(
        &config.omdb_base_url,
        config.omdb_api_key.clone(),
        config.omdb_timeout,
    )?);

    let state = AppState { store, lookup };

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

    let api_routes = Router::new()
        // Users
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/names", get(api::list_user_names))
        .route("/users/{user_id}", get(api::get_user))
        // Movies
        .route(
            "/users/{user_id}/movies",
            get(api::list_movies).post(api::add_movie),
        )
        .route(
            "/users/{user_id}/movies/{movie_id}",
            get(api::get_movie)
                .put(api::update_movie)
                .delete(api::delete_movie),
        );

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
