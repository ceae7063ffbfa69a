pub mod config;
pub mod db;
pub mod gamification;
pub mod logging;
pub mod progression;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::ProgressStore;
use crate::gamification::Engine;
use crate::state::AppState;

/// Connects the configured store and builds the app. A store that cannot be
/// opened leaves the service running in degraded mode.
pub async fn create_app(config: &Config) -> axum::Router {
    let store = match ProgressStore::connect(&config.database_url).await {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!(error = %err, url = %config.database_url, "progress store not initialized");
            None
        }
    };
    create_app_with_store(store, config.engine())
}

pub fn create_app_with_store(store: Option<ProgressStore>, engine: Engine) -> axum::Router {
    let state = AppState::new(store.map(Arc::new), Arc::new(engine));

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
