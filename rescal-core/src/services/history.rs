//! History log stored in the rescal database.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{History, HistoryAction};
use crate::db::to_db_time;
use crate::error::RescalResult;

pub struct SqlHistory {
    pool: SqlitePool,
    principal: String,
}

impl SqlHistory {
    pub fn new(pool: SqlitePool, principal: &str) -> Self {
        SqlHistory {
            pool,
            principal: principal.to_string(),
        }
    }

    /// Logged actions for `object_id`, oldest first.
    pub async fn actions(&self, object_id: &str) -> RescalResult<Vec<String>> {
        let actions = sqlx::query_scalar(
            "SELECT history_action FROM rescal_history WHERE object_uid = ? ORDER BY history_id",
        )
        .bind(object_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(actions)
    }
}

#[async_trait]
impl History for SqlHistory {
    async fn log(&self, object_id: &str, action: HistoryAction) -> RescalResult<()> {
        sqlx::query(
            "INSERT INTO rescal_history (object_uid, history_action, history_who, history_ts) VALUES (?, ?, ?, ?)",
        )
        .bind(object_id)
        .bind(action.to_string())
        .bind(&self.principal)
        .bind(to_db_time(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_log_records_actions_in_order() {
        let pool = connect_in_memory().await.unwrap();
        let history = SqlHistory::new(pool, "alice");

        history.log("rescal:team:abc", HistoryAction::Add).await.unwrap();
        history.log("rescal:team:abc", HistoryAction::Modify).await.unwrap();
        history.log("rescal:other:abc", HistoryAction::Delete).await.unwrap();

        assert_eq!(
            history.actions("rescal:team:abc").await.unwrap(),
            vec!["add".to_string(), "modify".to_string()]
        );
    }
}
