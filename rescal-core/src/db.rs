//! Database connection and schema.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{RescalError, RescalResult};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Open (creating if needed) the database at `url` and apply migrations.
pub async fn connect(url: &str) -> RescalResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    if let Some(parent) = options.get_filename().parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;

    tracing::debug!(url, "database ready");
    Ok(pool)
}

/// A private in-memory database with the schema applied.
///
/// Each SQLite memory connection is its own database, so the pool holds
/// exactly one connection and never recycles it.
pub async fn connect_in_memory() -> RescalResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// Timestamps are stored as sortable `YYYY-MM-DD HH:MM:SS` UTC text.
pub(crate) fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.format(DB_TIME_FORMAT).to_string()
}

pub(crate) fn from_db_time(s: &str) -> RescalResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DB_TIME_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| RescalError::Serialization(format!("Invalid stored time '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_time_sorts_lexically() {
        let early = to_db_time(Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
        let late = to_db_time(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap());
        assert_eq!(early, "2024-01-08 09:00:00");
        assert!(early < late);
        assert_eq!(from_db_time(&late).unwrap(), Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_from_db_time_rejects_garbage() {
        assert!(matches!(from_db_time("tomorrow"), Err(RescalError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_connect_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rescal.db");
        let url = format!("sqlite://{}", path.display());

        let pool = connect(&url).await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'rescal_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(tables, 6);
        assert!(path.exists());
    }
}
