mod health;
mod leaderboard;
mod learners;
mod levels;

use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/learners", learners::router())
        .nest("/api/leaderboard", leaderboard::router())
        .nest("/api/levels", levels::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("Ressource introuvable").into_response()
}
