//! Tag storage keyed by event UID.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::Tagger;
use crate::error::RescalResult;

pub struct SqlTagger {
    pool: SqlitePool,
}

impl SqlTagger {
    pub fn new(pool: SqlitePool) -> Self {
        SqlTagger { pool }
    }
}

#[async_trait]
impl Tagger for SqlTagger {
    async fn tag(&self, uid: &str, tags: &[String]) -> RescalResult<()> {
        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO rescal_tags (object_uid, tag_name) VALUES (?, ?)")
                .bind(uid)
                .bind(tag)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn replace_tags(&self, uid: &str, tags: &[String]) -> RescalResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rescal_tags WHERE object_uid = ?")
            .bind(uid)
            .execute(&mut *tx)
            .await?;

        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO rescal_tags (object_uid, tag_name) VALUES (?, ?)")
                .bind(uid)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn tags(&self, uid: &str) -> RescalResult<Vec<String>> {
        let tags = sqlx::query_scalar(
            "SELECT tag_name FROM rescal_tags WHERE object_uid = ? ORDER BY tag_name",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_replace_tags_drops_previous_set() {
        let pool = connect_in_memory().await.unwrap();
        let tagger = SqlTagger::new(pool);

        tagger
            .tag("uid-1", &["work".to_string(), "weekly".to_string()])
            .await
            .unwrap();
        tagger.replace_tags("uid-1", &["home".to_string()]).await.unwrap();

        assert_eq!(tagger.tags("uid-1").await.unwrap(), vec!["home".to_string()]);
        assert!(tagger.tags("uid-2").await.unwrap().is_empty());
    }
}
