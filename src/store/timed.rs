//! Timeout wrapper for history store calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{HistoryStore, MentionEvent, Result, StoreError, TopicRecord};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds every call of the inner store with `tokio::time::timeout`.
///
/// Expiry surfaces as [`StoreError::Timeout`]; the inner future is dropped.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimedStore<S> {
    /// Wraps `inner`, limiting each call to `timeout`.
    #[must_use]
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The configured per-call limit.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis(), "History store call timed out");
                Err(StoreError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<S: HistoryStore> HistoryStore for TimedStore<S> {
    async fn insert_topic_if_absent(&self, topic: &TopicRecord) -> Result<bool> {
        self.bounded("insert_topic_if_absent", self.inner.insert_topic_if_absent(topic))
            .await
    }

    async fn mark_retired(&self, canonical: &str) -> Result<bool> {
        self.bounded("mark_retired", self.inner.mark_retired(canonical))
            .await
    }

    async fn list_topics(&self) -> Result<Vec<TopicRecord>> {
        self.bounded("list_topics", self.inner.list_topics()).await
    }

    async fn append_mention(&self, event: &MentionEvent) -> Result<()> {
        self.bounded("append_mention", self.inner.append_mention(event))
            .await
    }

    async fn latest_mention(&self, canonical: &str) -> Result<Option<MentionEvent>> {
        self.bounded("latest_mention", self.inner.latest_mention(canonical))
            .await
    }
}
