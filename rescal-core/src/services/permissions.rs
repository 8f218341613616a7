//! Calendar ownership and read shares.
//!
//! Resource calendars are readable by everyone so that any user can see
//! when a room is booked.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::Permissions;
use crate::error::{RescalError, RescalResult};

/// A registered calendar.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CalendarInfo {
    #[sqlx(rename = "calendar_id")]
    pub id: String,
    #[sqlx(rename = "calendar_name")]
    pub name: Option<String>,
    #[sqlx(rename = "calendar_owner")]
    pub owner: String,
}

pub struct SqlPermissions {
    pool: SqlitePool,
    principal: String,
}

impl SqlPermissions {
    pub fn new(pool: SqlitePool, principal: &str) -> Self {
        SqlPermissions {
            pool,
            principal: principal.to_string(),
        }
    }

    /// Register a calendar owned by the principal.
    pub async fn add_calendar(&self, id: &str, name: Option<&str>) -> RescalResult<()> {
        let result = sqlx::query(
            "INSERT INTO rescal_calendars (calendar_id, calendar_name, calendar_owner) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(&self.principal)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RescalError::Validation(format!("Calendar '{}' already exists", id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Let `reader` read one of the principal's calendars.
    pub async fn share(&self, calendar: &str, reader: &str) -> RescalResult<()> {
        if !self.owned_calendars().await?.contains(calendar) {
            return Err(RescalError::PermissionDenied(format!(
                "{} does not own calendar '{}'",
                self.principal, calendar
            )));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO rescal_calendar_readers (calendar_id, principal) VALUES (?, ?)",
        )
        .bind(calendar)
        .bind(reader)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Registered calendars the principal can read.
    pub async fn calendars(&self) -> RescalResult<Vec<CalendarInfo>> {
        let readable = self.readable_calendars().await?;
        let all: Vec<CalendarInfo> = sqlx::query_as(
            "SELECT calendar_id, calendar_name, calendar_owner FROM rescal_calendars ORDER BY calendar_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(all.into_iter().filter(|c| readable.contains(&c.id)).collect())
    }
}

#[async_trait]
impl Permissions for SqlPermissions {
    fn principal(&self) -> &str {
        &self.principal
    }

    async fn owned_calendars(&self) -> RescalResult<HashSet<String>> {
        let owned: Vec<String> =
            sqlx::query_scalar("SELECT calendar_id FROM rescal_calendars WHERE calendar_owner = ?")
                .bind(&self.principal)
                .fetch_all(&self.pool)
                .await?;
        Ok(owned.into_iter().collect())
    }

    async fn readable_calendars(&self) -> RescalResult<HashSet<String>> {
        let mut readable = self.owned_calendars().await?;

        let shared: Vec<String> =
            sqlx::query_scalar("SELECT calendar_id FROM rescal_calendar_readers WHERE principal = ?")
                .bind(&self.principal)
                .fetch_all(&self.pool)
                .await?;
        readable.extend(shared);

        let resources: Vec<String> =
            sqlx::query_scalar("SELECT resource_calendar FROM rescal_resources")
                .fetch_all(&self.pool)
                .await?;
        readable.extend(resources);

        Ok(readable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_owned_and_shared_calendars() {
        let pool = connect_in_memory().await.unwrap();
        let alice = SqlPermissions::new(pool.clone(), "alice");
        let bob = SqlPermissions::new(pool.clone(), "bob");

        alice.add_calendar("alice-work", Some("Work")).await.unwrap();
        bob.add_calendar("bob-home", None).await.unwrap();
        alice.share("alice-work", "bob").await.unwrap();

        let owned = bob.owned_calendars().await.unwrap();
        assert_eq!(owned.len(), 1);
        assert!(owned.contains("bob-home"));

        let readable = bob.readable_calendars().await.unwrap();
        assert!(readable.contains("alice-work"));
        assert!(!alice.readable_calendars().await.unwrap().contains("bob-home"));
    }

    #[tokio::test]
    async fn test_only_owner_can_share() {
        let pool = connect_in_memory().await.unwrap();
        let alice = SqlPermissions::new(pool.clone(), "alice");
        let bob = SqlPermissions::new(pool, "bob");

        alice.add_calendar("alice-work", None).await.unwrap();
        let err = bob.share("alice-work", "bob").await.unwrap_err();
        assert!(matches!(err, RescalError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_duplicate_calendar_is_rejected() {
        let pool = connect_in_memory().await.unwrap();
        let alice = SqlPermissions::new(pool, "alice");

        alice.add_calendar("work", None).await.unwrap();
        let err = alice.add_calendar("work", None).await.unwrap_err();
        assert!(matches!(err, RescalError::Validation(_)));
    }
}
