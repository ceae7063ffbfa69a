use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::progression::rpg::TrackProgress;
use crate::progression::LevelProgress;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:xp", get(level_for_xp))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LevelData {
    #[serde(flatten)]
    level: LevelProgress,
    percent: f64,
    rpg_player: TrackProgress,
}

/// Pure leveling lookup, no learner involved.
async fn level_for_xp(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let xp: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("XP invalide: {raw}")))?;

    let engine = state.engine();
    let level = engine.curve().progress(xp)?;
    let mut rpg_player = TrackProgress::player();
    rpg_player.add_experience(level.total_xp);

    Ok(ok(LevelData {
        percent: level.percent(),
        level,
        rpg_player,
    }))
}
