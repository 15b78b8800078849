//! `SQLite`-backed history store.

use async_trait::async_trait;
use tracing::instrument;

use super::{HistoryStore, MentionEvent, Result, TopicRecord};
use crate::db::Database;

/// History store over the `topics` and `mentions` tables.
#[derive(Debug, Clone)]
pub struct SqliteHistory {
    db: Database,
}

impl SqliteHistory {
    /// Creates a store over an already-migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    #[instrument(skip(self, topic), fields(canonical = %topic.canonical))]
    async fn insert_topic_if_absent(&self, topic: &TopicRecord) -> Result<bool> {
        let result = sqlx::query(
            r"INSERT INTO topics (canonical, display, added_by, retired)
              VALUES (?, ?, ?, ?)
              ON CONFLICT (canonical) DO NOTHING",
        )
        .bind(&topic.canonical)
        .bind(&topic.display)
        .bind(&topic.added_by)
        .bind(topic.retired)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn mark_retired(&self, canonical: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE topics SET retired = 1 WHERE canonical = ?")
            .bind(canonical)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_topics(&self) -> Result<Vec<TopicRecord>> {
        let topics = sqlx::query_as::<_, TopicRecord>(
            "SELECT canonical, display, added_by, retired FROM topics ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(topics)
    }

    #[instrument(skip(self, event), fields(topic = %event.topic))]
    async fn append_mention(&self, event: &MentionEvent) -> Result<()> {
        sqlx::query("INSERT INTO mentions (topic, posted_by, posted_at) VALUES (?, ?, ?)")
            .bind(&event.topic)
            .bind(&event.posted_by)
            .bind(event.posted_at)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_mention(&self, canonical: &str) -> Result<Option<MentionEvent>> {
        let event = sqlx::query_as::<_, MentionEvent>(
            r"SELECT topic, posted_by, posted_at FROM mentions
              WHERE topic = ?
              ORDER BY posted_at DESC, id DESC
              LIMIT 1",
        )
        .bind(canonical)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(event)
    }
}
