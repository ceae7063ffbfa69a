use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::gamification::Command;
use crate::response::{ok, AppError};
use crate::services::progress;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_learner))
        .route("/:id/progress", get(get_progress))
        .route("/:id/xp", post(add_xp))
        .route("/:id/lessons", post(complete_lesson))
        .route("/:id/quizzes", post(complete_quiz))
        .route("/:id/activity", post(record_activity))
        .route("/:id/contributions", post(record_contribution))
        .route("/:id/achievements", get(list_achievements))
        .route("/:id/badges", get(list_badges))
        .route("/:id/challenges", get(list_challenges))
        .route(
            "/:id/challenges/:challenge_id/complete",
            post(complete_challenge),
        )
        .route("/:id/events", get(list_events))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLearnerRequest {
    user_id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddXpRequest {
    points: i64,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonRequest {
    lesson_id: String,
    score: i64,
    #[serde(default)]
    minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizRequest {
    quiz_id: String,
    score: i64,
    #[serde(default)]
    perfect: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChallengesQuery {
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<i64>,
}

async fn create_learner(
    State(state): State<AppState>,
    payload: Result<Json<CreateLearnerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let store = state.require_store()?;
    let snapshot = progress::create_learner(
        &store,
        &state.engine(),
        &payload.user_id,
        &payload.username,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, ok(snapshot)))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.require_store()?;
    let snapshot = progress::get_progress(&store, &state.engine(), &id, Utc::now()).await?;
    Ok(ok(snapshot))
}

async fn run_command(
    state: &AppState,
    user_id: &str,
    command: Command,
) -> Result<impl IntoResponse, AppError> {
    let store = state.require_store()?;
    let outcome =
        progress::apply_command(&store, &state.engine(), user_id, command, Utc::now()).await?;
    Ok(ok(outcome))
}

async fn add_xp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddXpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let source = payload
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());
    run_command(
        &state,
        &id,
        Command::AddXp {
            points: payload.points,
            source,
        },
    )
    .await
}

async fn complete_lesson(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<LessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    run_command(
        &state,
        &id,
        Command::CompleteLesson {
            lesson_id: payload.lesson_id,
            score: payload.score,
            minutes: payload.minutes,
        },
    )
    .await
}

async fn complete_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let perfect = payload.perfect.unwrap_or(payload.score == 100);
    run_command(
        &state,
        &id,
        Command::CompleteQuiz {
            quiz_id: payload.quiz_id,
            score: payload.score,
            perfect,
        },
    )
    .await
}

async fn record_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    run_command(&state, &id, Command::RecordActivity).await
}

async fn record_contribution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    run_command(&state, &id, Command::RecordContribution).await
}

async fn complete_challenge(
    State(state): State<AppState>,
    Path((id, challenge_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    run_command(&state, &id, Command::CompleteChallenge { challenge_id }).await
}

async fn list_achievements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.require_store()?;
    let list = progress::achievements(&store, &state.engine(), &id, Utc::now()).await?;
    Ok(ok(list))
}

async fn list_badges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.require_store()?;
    let list = progress::badges(&store, &state.engine(), &id).await?;
    Ok(ok(list))
}

async fn list_challenges(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<ChallengesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let store = state.require_store()?;
    let list = progress::challenges(
        &store,
        &state.engine(),
        &id,
        query.kind.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(ok(list))
}

async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let store = state.require_store()?;
    let list = progress::events(&store, &id, query.limit).await?;
    Ok(ok(list))
}
