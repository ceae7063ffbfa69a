use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::operations::{self, StoredEvent};
use crate::db::{ProgressStore, StoreError};
use crate::gamification::achievements::{
    achievements_with_status, badges_with_status, AchievementStatus, BadgeStatus,
};
use crate::gamification::catalog::ChallengeKind;
use crate::gamification::challenges::DailyChallenge;
use crate::gamification::leaderboard::{
    rank_entries, LeaderboardCandidate, LeaderboardEntry, LeaderboardScope,
};
use crate::gamification::{Command, Engine, GamificationEvent, LearnerState, LearnerStats};
use crate::progression::rpg::TrackProgress;
use crate::progression::{compute_streak, LevelProgress, ProgressionError, StreakRecord};

pub const MAX_ID_LEN: usize = 128;
pub const MAX_EVENTS: i64 = 200;
pub const DEFAULT_EVENTS: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ProgressServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub user_id: String,
    pub username: String,
    pub level: LevelProgress,
    pub streak: StreakRecord,
    pub stats: LearnerStats,
    pub achievements_unlocked: usize,
    pub achievements_total: usize,
    pub badges_earned: usize,
    pub badges_total: usize,
    pub rpg_player: TrackProgress,
}

impl ProgressSnapshot {
    pub fn from_state(engine: &Engine, state: &LearnerState, now: DateTime<Utc>) -> Self {
        let mut rpg_player = TrackProgress::player();
        rpg_player.add_experience(state.stats.total_xp);

        Self {
            user_id: state.user_id.clone(),
            username: state.username.clone(),
            level: state.level(engine.curve()),
            streak: state.streak(now.date_naive()),
            stats: state.stats,
            achievements_unlocked: state.achievements.len(),
            achievements_total: engine.catalog().achievements.len(),
            badges_earned: state.badges.len(),
            badges_total: engine.catalog().badges.len(),
            rpg_player,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub events: Vec<GamificationEvent>,
    pub progress: ProgressSnapshot,
}

fn validate_id(field: &str, value: &str) -> Result<(), ProgressServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProgressServiceError::Validation(format!("{field} est requis")));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(ProgressServiceError::Validation(format!(
            "{field} dépasse {MAX_ID_LEN} caractères"
        )));
    }
    Ok(())
}

pub async fn create_learner(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<ProgressSnapshot, ProgressServiceError> {
    validate_id("userId", user_id)?;
    validate_id("username", username)?;

    let state = operations::create_learner(store.pool(), user_id.trim(), username.trim(), now).await?;
    tracing::info!(user_id = %state.user_id, "learner created");
    Ok(ProgressSnapshot::from_state(engine, &state, now))
}

pub async fn load_learner(
    store: &ProgressStore,
    user_id: &str,
) -> Result<LearnerState, ProgressServiceError> {
    Ok(operations::load_state(store.pool(), user_id).await?)
}

pub async fn get_progress(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ProgressSnapshot, ProgressServiceError> {
    let state = load_learner(store, user_id).await?;
    Ok(ProgressSnapshot::from_state(engine, &state, now))
}

/// Loads the learner, applies one command and persists the new state with
/// its events in one write transaction. Nothing is written when the command
/// is rejected.
pub async fn apply_command(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
    command: Command,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, ProgressServiceError> {
    let mut tx = store.pool().begin().await.map_err(StoreError::from)?;
    let mut state = operations::lock_state(&mut tx, user_id, now).await?;

    let events = match engine.apply(&mut state, command, now) {
        Ok(events) => events,
        Err(err) => {
            tracing::debug!(user_id, error = %err, "command rejected");
            return Err(err.into());
        }
    };

    operations::save_progress(&mut tx, &state, &events, now).await?;
    tx.commit().await.map_err(StoreError::from)?;

    for event in &events {
        log_event(user_id, event);
    }

    Ok(CommandOutcome {
        progress: ProgressSnapshot::from_state(engine, &state, now),
        events,
    })
}

fn log_event(user_id: &str, event: &GamificationEvent) {
    match event {
        GamificationEvent::LevelUp { from, to, bonus } => {
            tracing::info!(user_id, from, to, bonus, "level up");
        }
        GamificationEvent::AchievementUnlocked { achievement_id, .. } => {
            tracing::info!(user_id, achievement_id = %achievement_id, "achievement unlocked");
        }
        GamificationEvent::BadgeEarned { badge_id, .. } => {
            tracing::info!(user_id, badge_id = %badge_id, "badge earned");
        }
        other => {
            tracing::debug!(user_id, kind = other.kind(), "gamification event");
        }
    }
}

pub async fn achievements(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<AchievementStatus>, ProgressServiceError> {
    let state = load_learner(store, user_id).await?;
    let streak = state.streak(now.date_naive());
    Ok(achievements_with_status(engine.catalog(), &state, &streak))
}

pub async fn badges(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
) -> Result<Vec<BadgeStatus>, ProgressServiceError> {
    let state = load_learner(store, user_id).await?;
    Ok(badges_with_status(engine.catalog(), &state))
}

/// Today's challenges, optionally only those of `kind`.
pub async fn challenges(
    store: &ProgressStore,
    engine: &Engine,
    user_id: &str,
    kind: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<DailyChallenge>, ProgressServiceError> {
    let kind = kind
        .map(|raw| {
            ChallengeKind::parse(raw).ok_or_else(|| {
                ProgressServiceError::Validation(format!("type de défi inconnu: {raw}"))
            })
        })
        .transpose()?;

    let state = load_learner(store, user_id).await?;
    let mut list = engine.current_challenges(&state, now);
    if let Some(kind) = kind {
        list.retain(|c| c.kind == kind);
    }
    Ok(list)
}

pub async fn events(
    store: &ProgressStore,
    user_id: &str,
    limit: Option<i64>,
) -> Result<Vec<StoredEvent>, ProgressServiceError> {
    if !operations::learner_exists(store.pool(), user_id).await? {
        return Err(StoreError::NotFound(user_id.to_string()).into());
    }
    let limit = limit.unwrap_or(DEFAULT_EVENTS).clamp(1, MAX_EVENTS);
    Ok(operations::recent_events(store.pool(), user_id, limit).await?)
}

pub async fn leaderboard(
    store: &ProgressStore,
    engine: &Engine,
    scope: LeaderboardScope,
    limit: Option<usize>,
    current_user: Option<&str>,
    friends: &HashSet<String>,
    now: DateTime<Utc>,
) -> Result<Vec<LeaderboardEntry>, ProgressServiceError> {
    let restrict: Option<Vec<String>> = match scope {
        LeaderboardScope::Global => None,
        LeaderboardScope::Friends => Some(
            friends
                .iter()
                .cloned()
                .chain(current_user.map(str::to_string))
                .collect(),
        ),
    };

    let rows = operations::leaderboard_rows(store.pool(), restrict.as_deref()).await?;
    let today = now.date_naive();
    let candidates = rows
        .into_iter()
        .map(|row| LeaderboardCandidate {
            level: engine.curve().level(row.total_xp),
            streak_days: compute_streak(&row.activity_dates, today).current,
            user_id: row.user_id,
            username: row.username,
            total_xp: row.total_xp,
        })
        .collect();

    Ok(rank_entries(candidates, scope, friends, current_user, limit))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    // Wednesday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap()
    }

    async fn setup() -> (ProgressStore, Engine) {
        let store = ProgressStore::in_memory().await.unwrap();
        let engine = Engine::default();
        create_learner(&store, &engine, "u1", "Ndedi", now()).await.unwrap();
        (store, engine)
    }

    #[tokio::test]
    async fn test_perfect_lesson_outcome() {
        let (store, engine) = setup().await;

        let outcome = apply_command(
            &store,
            &engine,
            "u1",
            Command::CompleteLesson {
                lesson_id: "l1".into(),
                score: 100,
                minutes: 5,
            },
            now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.progress.stats.total_xp, 148);
        assert_eq!(outcome.progress.level.level, 1);
        assert_eq!(outcome.progress.level.xp_to_next_level, 852);
        assert_eq!(outcome.progress.streak.current, 1);
        assert_eq!(outcome.progress.achievements_unlocked, 1);
        assert_eq!(outcome.progress.badges_earned, 1);
        assert_eq!(outcome.progress.rpg_player.level, 2);

        let stored = get_progress(&store, &engine, "u1", now()).await.unwrap();
        assert_eq!(stored.stats, outcome.progress.stats);

        let logged = events(&store, "u1", None).await.unwrap();
        assert_eq!(logged.len(), outcome.events.len());
    }

    #[tokio::test]
    async fn test_rejected_command_writes_nothing() {
        let (store, engine) = setup().await;

        let err = apply_command(
            &store,
            &engine,
            "u1",
            Command::AddXp {
                points: -1,
                source: "manual".into(),
            },
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Progression(ProgressionError::NegativeXp(-1))
        ));

        let snapshot = get_progress(&store, &engine, "u1", now()).await.unwrap();
        assert_eq!(snapshot.stats.total_xp, 0);
        assert!(events(&store, "u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_learner() {
        let (store, engine) = setup().await;
        let err = get_progress(&store, &engine, "ghost", now()).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::Store(StoreError::NotFound(_))));
        assert!(events(&store, "ghost", None).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_ids_rejected() {
        let store = ProgressStore::in_memory().await.unwrap();
        let engine = Engine::default();
        let err = create_learner(&store, &engine, "", "x", now()).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_challenges_filtered_by_kind() {
        let (store, engine) = setup().await;

        let all = challenges(&store, &engine, "u1", None, now()).await.unwrap();
        assert_eq!(all.len(), 4);

        let quizzes = challenges(&store, &engine, "u1", Some("quiz"), now()).await.unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].kind, ChallengeKind::Quiz);

        let err = challenges(&store, &engine, "u1", Some("karaoke"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_friends_leaderboard_includes_current_user() {
        let (store, engine) = setup().await;
        create_learner(&store, &engine, "u2", "Ekane", now()).await.unwrap();
        create_learner(&store, &engine, "u3", "Mbappe", now()).await.unwrap();
        apply_command(&store, &engine, "u3", Command::RecordContribution, now())
            .await
            .unwrap();

        let friends: HashSet<String> = ["u3".to_string()].into_iter().collect();
        let entries = leaderboard(
            &store,
            &engine,
            LeaderboardScope::Friends,
            None,
            Some("u1"),
            &friends,
            now(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u3", "u1"]);
        assert_eq!(entries[0].streak_days, 1);
        assert!(entries[1].is_current_user);
    }
}
