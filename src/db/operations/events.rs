use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::db::StoreError;
use crate::gamification::GamificationEvent;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub event: GamificationEvent,
}

pub(crate) async fn insert_events(
    tx: &mut Transaction<'_, Sqlite>,
    learner_id: &str,
    events: &[GamificationEvent],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    for (seq, event) in events.iter().enumerate() {
        let payload = serde_json::to_string(event)
            .map_err(|e| StoreError::Decode(format!("event payload: {e}")))?;
        sqlx::query(
            r#"INSERT INTO "gamification_events" ("id", "learnerId", "seq", "kind", "payload", "createdAt")
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(learner_id)
        .bind(seq as i64)
        .bind(event.kind())
        .bind(payload)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Most recent events first.
pub async fn recent_events(
    pool: &SqlitePool,
    learner_id: &str,
    limit: i64,
) -> Result<Vec<StoredEvent>, StoreError> {
    let rows = sqlx::query(
        r#"SELECT "id", "kind", "payload", "createdAt" FROM "gamification_events"
           WHERE "learnerId" = ?
           ORDER BY "createdAt" DESC, "seq" DESC
           LIMIT ?"#,
    )
    .bind(learner_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<StoredEvent, StoreError> {
            let payload: String = row.try_get("payload")?;
            let event = serde_json::from_str(&payload)
                .map_err(|e| StoreError::Decode(format!("event payload: {e}")))?;
            Ok(StoredEvent {
                id: row.try_get("id")?,
                kind: row.try_get("kind")?,
                created_at: row.try_get("createdAt")?,
                event,
            })
        })
        .collect()
}
