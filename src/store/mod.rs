//! History store: durable record of topics and mention events.
//!
//! The store is the source of truth; the in-memory
//! [`TopicRegistry`](crate::registry::TopicRegistry) is a write-through cache
//! over it.
//!
//! # Overview
//!
//! - [`HistoryStore`] - Narrow persistence contract consumed by the core
//! - [`SqliteHistory`] - `SQLite` implementation backed by [`Database`](crate::Database)
//! - [`TimedStore`] - Wrapper bounding every call with a timeout
//! - [`StoreError`] - Operation error types

mod error;
mod sqlite;
mod timed;

pub use error::{StoreError, StoreErrorKind};
pub use sqlite::SqliteHistory;
pub use timed::{DEFAULT_STORE_TIMEOUT, TimedStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persisted topic row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TopicRecord {
    /// Canonical (NFKC + case-folded) form; unique key.
    pub canonical: String,
    /// Display form as first registered.
    pub display: String,
    /// Nick of the user who registered the topic.
    pub added_by: String,
    /// Permanently retired flag.
    pub retired: bool,
}

/// A single confirmed mention.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct MentionEvent {
    /// Canonical form of the mentioned topic.
    pub topic: String,
    /// Nick of the author of the message.
    pub posted_by: String,
    /// When the message was processed.
    pub posted_at: DateTime<Utc>,
}

/// Data-access contract for topics and mentions.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Inserts the topic unless its canonical form already exists.
    ///
    /// Returns `true` when a row was inserted.
    async fn insert_topic_if_absent(&self, topic: &TopicRecord) -> Result<bool>;

    /// Sets the retired flag on a topic. Returns `false` if no such topic exists.
    async fn mark_retired(&self, canonical: &str) -> Result<bool>;

    /// Lists every persisted topic, active and retired, in registration order.
    async fn list_topics(&self) -> Result<Vec<TopicRecord>>;

    /// Appends a mention event.
    async fn append_mention(&self, event: &MentionEvent) -> Result<()>;

    /// Returns the most recent mention of a topic, if any.
    async fn latest_mention(&self, canonical: &str) -> Result<Option<MentionEvent>>;
}

#[async_trait]
impl<S: HistoryStore + ?Sized> HistoryStore for Box<S> {
    async fn insert_topic_if_absent(&self, topic: &TopicRecord) -> Result<bool> {
        (**self).insert_topic_if_absent(topic).await
    }

    async fn mark_retired(&self, canonical: &str) -> Result<bool> {
        (**self).mark_retired(canonical).await
    }

    async fn list_topics(&self) -> Result<Vec<TopicRecord>> {
        (**self).list_topics().await
    }

    async fn append_mention(&self, event: &MentionEvent) -> Result<()> {
        (**self).append_mention(event).await
    }

    async fn latest_mention(&self, canonical: &str) -> Result<Option<MentionEvent>> {
        (**self).latest_mention(canonical).await
    }
}
