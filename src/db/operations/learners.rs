use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use crate::db::operations::events::insert_events;
use crate::db::{from_db_int, to_db_int, StoreError};
use crate::gamification::challenges::DailyChallenge;
use crate::gamification::{GamificationEvent, LearnerState, LearnerStats};

/// Upper bound on learners scanned for a leaderboard.
const LEADERBOARD_SCAN_LIMIT: i64 = 1000;

#[derive(Debug, Clone)]
pub struct LearnerRow {
    pub user_id: String,
    pub username: String,
    pub total_xp: u64,
    pub activity_dates: BTreeSet<NaiveDate>,
}

pub async fn create_learner(
    pool: &SqlitePool,
    user_id: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<LearnerState, StoreError> {
    let result = sqlx::query(
        r#"INSERT INTO "learners" ("id", "username", "createdAt", "updatedAt")
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(user_id)
    .bind(username)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(LearnerState::new(user_id, username)),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(StoreError::Conflict(user_id.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn learner_exists(pool: &SqlitePool, user_id: &str) -> Result<bool, StoreError> {
    let found: Option<String> = sqlx::query_scalar(r#"SELECT "id" FROM "learners" WHERE "id" = ?"#)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Reads every table of the learner from one snapshot.
pub async fn load_state(pool: &SqlitePool, user_id: &str) -> Result<LearnerState, StoreError> {
    let mut tx = pool.begin().await?;
    let state = fetch_state(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(state)
}

/// Takes the database write lock, then loads the learner inside `tx`, so
/// concurrent updates to the same learner serialize.
pub async fn lock_state(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<LearnerState, StoreError> {
    let touched = sqlx::query(r#"UPDATE "learners" SET "updatedAt" = ? WHERE "id" = ?"#)
        .bind(now)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(StoreError::NotFound(user_id.to_string()));
    }
    fetch_state(tx, user_id).await
}

async fn fetch_state(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
) -> Result<LearnerState, StoreError> {
    let row = sqlx::query(
        r#"SELECT "id", "username", "totalXp", "lessonsCompleted", "quizzesPassed",
                  "perfectScores", "communityContributions", "totalMinutes", "challengeDay"
           FROM "learners" WHERE "id" = ?"#,
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;

    let activity_dates = sqlx::query_scalar::<_, NaiveDate>(
        r#"SELECT "activityDate" FROM "activity_log" WHERE "learnerId" = ?"#,
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .collect();

    let achievements = load_unlock_map(
        tx,
        r#"SELECT "achievementId", "unlockedAt" FROM "achievement_unlocks" WHERE "learnerId" = ?"#,
        user_id,
    )
    .await?;
    let badges = load_unlock_map(
        tx,
        r#"SELECT "badgeId", "earnedAt" FROM "badge_awards" WHERE "learnerId" = ?"#,
        user_id,
    )
    .await?;

    let payloads: Vec<String> = sqlx::query_scalar(
        r#"SELECT "payload" FROM "daily_challenges" WHERE "learnerId" = ? ORDER BY "position""#,
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;
    let challenges = payloads
        .iter()
        .map(|raw| {
            serde_json::from_str::<DailyChallenge>(raw)
                .map_err(|e| StoreError::Decode(format!("daily challenge: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LearnerState {
        user_id: row.try_get("id")?,
        username: row.try_get("username")?,
        stats: stats_from_row(&row)?,
        activity_dates,
        achievements,
        badges,
        challenge_day: row.try_get("challengeDay")?,
        challenges,
    })
}

async fn load_unlock_map(
    tx: &mut Transaction<'_, Sqlite>,
    sql: &str,
    user_id: &str,
) -> Result<BTreeMap<String, DateTime<Utc>>, StoreError> {
    let rows = sqlx::query(sql).bind(user_id).fetch_all(&mut **tx).await?;
    rows.iter()
        .map(|r| -> Result<_, StoreError> {
            Ok((r.try_get::<String, _>(0)?, r.try_get::<DateTime<Utc>, _>(1)?))
        })
        .collect()
}

fn stats_from_row(row: &SqliteRow) -> Result<LearnerStats, StoreError> {
    let get = |column: &str| -> Result<u64, StoreError> {
        Ok(from_db_int(row.try_get::<i64, _>(column)?))
    };
    Ok(LearnerStats {
        total_xp: get("totalXp")?,
        lessons_completed: get("lessonsCompleted")?,
        quizzes_passed: get("quizzesPassed")?,
        perfect_scores: get("perfectScores")?,
        community_contributions: get("communityContributions")?,
        total_minutes: get("totalMinutes")?,
    })
}

/// Writes the learner and the events produced for it. Nothing is visible
/// until the caller commits `tx`.
pub async fn save_progress(
    tx: &mut Transaction<'_, Sqlite>,
    state: &LearnerState,
    events: &[GamificationEvent],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {

    let updated = sqlx::query(
        r#"UPDATE "learners" SET
             "username" = ?, "totalXp" = ?, "lessonsCompleted" = ?, "quizzesPassed" = ?,
             "perfectScores" = ?, "communityContributions" = ?, "totalMinutes" = ?,
             "challengeDay" = ?, "updatedAt" = ?
           WHERE "id" = ?"#,
    )
    .bind(&state.username)
    .bind(to_db_int(state.stats.total_xp))
    .bind(to_db_int(state.stats.lessons_completed))
    .bind(to_db_int(state.stats.quizzes_passed))
    .bind(to_db_int(state.stats.perfect_scores))
    .bind(to_db_int(state.stats.community_contributions))
    .bind(to_db_int(state.stats.total_minutes))
    .bind(state.challenge_day)
    .bind(now)
    .bind(&state.user_id)
    .execute(&mut **tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound(state.user_id.clone()));
    }

    for date in &state.activity_dates {
        sqlx::query(
            r#"INSERT OR IGNORE INTO "activity_log" ("learnerId", "activityDate") VALUES (?, ?)"#,
        )
        .bind(&state.user_id)
        .bind(date)
        .execute(&mut **tx)
        .await?;
    }

    for (id, at) in &state.achievements {
        sqlx::query(
            r#"INSERT OR IGNORE INTO "achievement_unlocks" ("learnerId", "achievementId", "unlockedAt")
               VALUES (?, ?, ?)"#,
        )
        .bind(&state.user_id)
        .bind(id)
        .bind(at)
        .execute(&mut **tx)
        .await?;
    }

    for (id, at) in &state.badges {
        sqlx::query(
            r#"INSERT OR IGNORE INTO "badge_awards" ("learnerId", "badgeId", "earnedAt")
               VALUES (?, ?, ?)"#,
        )
        .bind(&state.user_id)
        .bind(id)
        .bind(at)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(r#"DELETE FROM "daily_challenges" WHERE "learnerId" = ?"#)
        .bind(&state.user_id)
        .execute(&mut **tx)
        .await?;
    for (position, challenge) in state.challenges.iter().enumerate() {
        let payload = serde_json::to_string(challenge)
            .map_err(|e| StoreError::Decode(format!("daily challenge: {e}")))?;
        sqlx::query(
            r#"INSERT INTO "daily_challenges" ("learnerId", "challengeId", "position", "payload")
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&state.user_id)
        .bind(&challenge.id)
        .bind(position as i64)
        .bind(payload)
        .execute(&mut **tx)
        .await?;
    }

    insert_events(tx, &state.user_id, events, now).await
}

/// Learners ordered by XP, optionally restricted to `only`.
pub async fn leaderboard_rows(
    pool: &SqlitePool,
    only: Option<&[String]>,
) -> Result<Vec<LearnerRow>, StoreError> {
    if matches!(only, Some(ids) if ids.is_empty()) {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new(r#"SELECT "id", "username", "totalXp" FROM "learners""#);
    if let Some(ids) = only {
        query.push(r#" WHERE "id" IN ("#);
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
    }
    query.push(r#" ORDER BY "totalXp" DESC LIMIT "#);
    query.push_bind(LEADERBOARD_SCAN_LIMIT);

    let rows = query.build().fetch_all(pool).await?;
    let mut learners = rows
        .iter()
        .map(|r| -> Result<LearnerRow, StoreError> {
            Ok(LearnerRow {
                user_id: r.try_get("id")?,
                username: r.try_get("username")?,
                total_xp: from_db_int(r.try_get("totalXp")?),
                activity_dates: BTreeSet::new(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if learners.is_empty() {
        return Ok(learners);
    }

    let mut activity: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"SELECT "learnerId", "activityDate" FROM "activity_log" WHERE "learnerId" IN ("#,
    );
    let mut separated = activity.separated(", ");
    for learner in &learners {
        separated.push_bind(learner.user_id.clone());
    }
    separated.push_unseparated(")");

    let mut dates: HashMap<String, BTreeSet<NaiveDate>> = HashMap::new();
    for row in activity.build().fetch_all(pool).await? {
        let learner_id: String = row.try_get("learnerId")?;
        let date: NaiveDate = row.try_get("activityDate")?;
        dates.entry(learner_id).or_default().insert(date);
    }
    for learner in &mut learners {
        if let Some(found) = dates.remove(&learner.user_id) {
            learner.activity_dates = found;
        }
    }

    Ok(learners)
}
