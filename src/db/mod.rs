pub mod operations;
pub mod schema;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::schema::{split_sql_statements, SCHEMA_SQL, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("learner not found: {0}")]
    NotFound(String),
    #[error("learner already exists: {0}")]
    Conflict(String),
    #[error("failed to decode stored value: {0}")]
    Decode(String),
    #[error("store io error: {0}")]
    Io(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct ProgressStore {
    pool: SqlitePool,
}

impl ProgressStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        if let Some(parent) = database_file(url).and_then(|path| path.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Single-connection in-memory store; every connection to `:memory:` is
    /// a distinct database, so the pool must not grow.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Recorded schema version; `None` only when the metadata table is missing.
async fn applied_schema_version(pool: &SqlitePool) -> Result<Option<String>, StoreError> {
    let metadata: Option<String> = sqlx::query_scalar(
        r#"SELECT "name" FROM "sqlite_master" WHERE "type" = 'table' AND "name" = '_db_metadata'"#,
    )
    .fetch_optional(pool)
    .await?;
    if metadata.is_none() {
        return Ok(None);
    }

    let version: Option<String> = sqlx::query_scalar(
        r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#,
    )
    .fetch_optional(pool)
    .await?;
    Ok(version)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    let applied = applied_schema_version(pool).await?;

    if applied.as_deref() == Some(SCHEMA_VERSION) {
        tracing::debug!(version = SCHEMA_VERSION, "schema already applied");
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(SCHEMA_SQL) {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    sqlx::query(
        r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#,
    )
    .bind(SCHEMA_VERSION)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(version = SCHEMA_VERSION, "applied progression schema");
    Ok(())
}

/// File path named by a `sqlite:` URL; `None` for in-memory databases.
fn database_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

pub(crate) fn to_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_db_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file("sqlite://data/maayegue.db"),
            Some(Path::new("data/maayegue.db"))
        );
        assert_eq!(
            database_file("sqlite:/tmp/x/progress.db?mode=rwc"),
            Some(Path::new("/tmp/x/progress.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
    }

    #[test]
    fn test_db_int_conversions_saturate() {
        assert_eq!(to_db_int(u64::MAX), i64::MAX);
        assert_eq!(from_db_int(-3), 0);
        assert_eq!(from_db_int(42), 42);
    }

    #[tokio::test]
    async fn test_schema_version_probe() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        assert_eq!(applied_schema_version(&pool).await.unwrap(), None);

        run_migrations(&pool).await.unwrap();
        assert_eq!(
            applied_schema_version(&pool).await.unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );

        pool.close().await;
        assert!(applied_schema_version(&pool).await.is_err());
        assert!(run_migrations(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = ProgressStore::in_memory().await.unwrap();
        run_migrations(store.pool()).await.unwrap();
        store.ping().await.unwrap();
    }
}
