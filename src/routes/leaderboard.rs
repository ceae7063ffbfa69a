use std::collections::HashSet;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::gamification::leaderboard::LeaderboardScope;
use crate::response::{ok, AppError};
use crate::services::progress;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_leaderboard))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardQuery {
    scope: Option<String>,
    limit: Option<usize>,
    user_id: Option<String>,
    /// Comma-separated user ids.
    friends: Option<String>,
}

async fn get_leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let store = state.require_store()?;
    let engine = state.engine();

    let scope = query
        .scope
        .as_deref()
        .map(LeaderboardScope::parse)
        .unwrap_or_default();
    let friends: HashSet<String> = query
        .friends
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let entries = progress::leaderboard(
        &store,
        &engine,
        scope,
        query.limit,
        query.user_id.as_deref(),
        &friends,
        Utc::now(),
    )
    .await?;

    Ok(ok(entries))
}
