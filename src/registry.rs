//! Topic registry: the in-memory snapshot of tracked and retired topics.
//!
//! The snapshot is a write-through cache over a [`HistoryStore`]. Every
//! mutation is persisted first and only applied in memory once the store
//! call succeeds, so a store failure leaves the snapshot untouched.

use tracing::{debug, info, instrument, warn};

use crate::normalize::{CanonicalString, canonicalize};
use crate::store::{self, HistoryStore, TopicRecord};

/// A registered topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Identity used for comparisons and storage keys.
    pub canonical: CanonicalString,
    /// Text as first registered.
    pub display: String,
    /// Nick that registered the topic.
    pub added_by: String,
}

impl Topic {
    fn from_record(record: TopicRecord) -> Self {
        Self {
            canonical: CanonicalString::from_stored(&record.canonical),
            display: record.display,
            added_by: record.added_by,
        }
    }

    fn to_record(&self, retired: bool) -> TopicRecord {
        TopicRecord {
            canonical: self.canonical.as_str().to_string(),
            display: self.display.clone(),
            added_by: self.added_by.clone(),
            retired,
        }
    }
}

/// Result of [`TopicRegistry::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Currently tracked.
    Active(&'a Topic),
    /// Permanently retired.
    Retired(&'a Topic),
    /// Never registered.
    Unknown,
}

/// Result of [`TopicRegistry::track`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Newly registered and persisted.
    Tracked(Topic),
    /// A topic with the same canonical form is already active.
    AlreadyActive(Topic),
    /// A topic with the same canonical form was retired and cannot return.
    Retired(Topic),
}

/// Result of [`TopicRegistry::retire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetireOutcome {
    /// Moved from active to retired; carries the original registrant.
    Retired(Topic),
    /// No active topic with that canonical form.
    NotFound,
}

/// Active and retired topic sets.
///
/// Invariant: a canonical form appears in at most one of the two sets.
/// Both sets keep registration order so replies come out in a stable order.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    active: Vec<Topic>,
    retired: Vec<Topic>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the store's topic table.
    ///
    /// # Errors
    ///
    /// Returns the store error if topics cannot be listed.
    pub async fn load<S: HistoryStore + ?Sized>(store: &S) -> store::Result<Self> {
        let mut registry = Self::new();
        registry.reload_from_store(store).await?;
        Ok(registry)
    }

    /// Active topics in registration order.
    pub fn active(&self) -> impl Iterator<Item = &Topic> {
        self.active.iter()
    }

    /// Retired topics in registration order.
    pub fn retired(&self) -> impl Iterator<Item = &Topic> {
        self.retired.iter()
    }

    /// Number of active topics.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Classifies a raw topic by canonical equality.
    #[must_use]
    pub fn lookup(&self, raw_topic: &str) -> Lookup<'_> {
        self.lookup_canonical(&canonicalize(raw_topic.trim()))
    }

    fn lookup_canonical(&self, canonical: &CanonicalString) -> Lookup<'_> {
        if let Some(topic) = self.active.iter().find(|t| &t.canonical == canonical) {
            return Lookup::Active(topic);
        }
        if let Some(topic) = self.retired.iter().find(|t| &t.canonical == canonical) {
            return Lookup::Retired(topic);
        }
        Lookup::Unknown
    }

    /// Registers a new topic on behalf of `author`.
    ///
    /// Already-active and retired topics are reported through the outcome,
    /// not as errors.
    ///
    /// # Errors
    ///
    /// Returns the store error if persisting fails; the snapshot is unchanged.
    #[instrument(skip(self, store))]
    pub async fn track<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
        raw_topic: &str,
        author: &str,
    ) -> store::Result<TrackOutcome> {
        let display = raw_topic.trim();
        let canonical = canonicalize(display);

        match self.lookup_canonical(&canonical) {
            Lookup::Active(topic) => return Ok(TrackOutcome::AlreadyActive(topic.clone())),
            Lookup::Retired(topic) => return Ok(TrackOutcome::Retired(topic.clone())),
            Lookup::Unknown => {}
        }

        let topic = Topic {
            canonical,
            display: display.to_string(),
            added_by: author.to_string(),
        };

        if store.insert_topic_if_absent(&topic.to_record(false)).await? {
            info!(topic = %topic.display, author, "Now tracking topic");
            self.active.push(topic.clone());
            return Ok(TrackOutcome::Tracked(topic));
        }

        // Another writer registered it first; adopt the store's view.
        warn!(topic = %topic.display, "Topic already present in store, reloading snapshot");
        self.reload_from_store(store).await?;
        Ok(match self.lookup_canonical(&topic.canonical) {
            Lookup::Retired(existing) => TrackOutcome::Retired(existing.clone()),
            Lookup::Active(existing) => TrackOutcome::AlreadyActive(existing.clone()),
            Lookup::Unknown => TrackOutcome::AlreadyActive(topic),
        })
    }

    /// Permanently retires an active topic.
    ///
    /// Authorization is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns the store error if persisting fails; the snapshot is unchanged.
    #[instrument(skip(self, store))]
    pub async fn retire<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
        raw_topic: &str,
    ) -> store::Result<RetireOutcome> {
        let canonical = canonicalize(raw_topic.trim());
        let Some(index) = self.active.iter().position(|t| t.canonical == canonical) else {
            return Ok(RetireOutcome::NotFound);
        };

        let updated = store.mark_retired(canonical.as_str()).await?;
        let topic = self.active.remove(index);
        if !updated {
            warn!(topic = %topic.display, "Active topic missing from store, dropping it");
            return Ok(RetireOutcome::NotFound);
        }

        info!(topic = %topic.display, added_by = %topic.added_by, "Retired topic");
        self.retired.push(topic.clone());
        Ok(RetireOutcome::Retired(topic))
    }

    /// Discards the snapshot and rebuilds it from the store.
    ///
    /// # Errors
    ///
    /// Returns the store error if topics cannot be listed; the previous
    /// snapshot is kept in that case.
    #[instrument(skip(self, store))]
    pub async fn reload_from_store<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> store::Result<()> {
        let records = store.list_topics().await?;

        let mut active = Vec::new();
        let mut retired: Vec<Topic> = Vec::new();
        for record in records {
            let is_retired = record.retired;
            let topic = Topic::from_record(record);
            // Rows edited by hand can collapse onto one canonical form; retirement wins.
            if is_retired {
                active.retain(|t: &Topic| t.canonical != topic.canonical);
                if !retired.iter().any(|t| t.canonical == topic.canonical) {
                    retired.push(topic);
                }
            } else if !retired.iter().any(|t| t.canonical == topic.canonical)
                && !active.iter().any(|t| t.canonical == topic.canonical)
            {
                active.push(topic);
            }
        }

        debug!(active = active.len(), retired = retired.len(), "Reloaded topics");
        self.active = active;
        self.retired = retired;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::store::SqliteHistory;

    async fn store() -> SqliteHistory {
        SqliteHistory::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_track_registers_and_persists() {
        let store = store().await;
        let mut registry = TopicRegistry::new();

        let outcome = registry.track(&store, "  Rust ", "alice").await.unwrap();
        let TrackOutcome::Tracked(topic) = outcome else {
            panic!("expected Tracked, got {outcome:?}");
        };
        assert_eq!(topic.display, "Rust");
        assert_eq!(topic.canonical.as_str(), "rust");
        assert_eq!(topic.added_by, "alice");

        let records = store.list_topics().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].canonical, "rust");
    }

    #[tokio::test]
    async fn test_track_same_canonical_form_is_already_active() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        registry.track(&store, "UEFI", "alice").await.unwrap();

        let outcome = registry.track(&store, "ｕｅｆｉ", "bob").await.unwrap();
        let TrackOutcome::AlreadyActive(topic) = outcome else {
            panic!("expected AlreadyActive, got {outcome:?}");
        };
        assert_eq!(topic.display, "UEFI");
        assert_eq!(registry.active_len(), 1);
    }

    #[tokio::test]
    async fn test_track_never_revives_retired_topic() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        registry.track(&store, "apt", "alice").await.unwrap();
        registry.retire(&store, "apt").await.unwrap();

        for attempt in ["apt", "APT", "Apt"] {
            let outcome = registry.track(&store, attempt, "mallory").await.unwrap();
            assert!(matches!(outcome, TrackOutcome::Retired(_)));
        }
        assert!(matches!(registry.lookup("apt"), Lookup::Retired(_)));
        assert_eq!(registry.active_len(), 0);
    }

    #[tokio::test]
    async fn test_retire_returns_original_author() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        registry.track(&store, "Fistula", "alice").await.unwrap();

        let outcome = registry.retire(&store, "FISTULA").await.unwrap();
        let RetireOutcome::Retired(topic) = outcome else {
            panic!("expected Retired, got {outcome:?}");
        };
        assert_eq!(topic.added_by, "alice");
        assert_eq!(topic.display, "Fistula");
        assert!(store.list_topics().await.unwrap()[0].retired);
    }

    #[tokio::test]
    async fn test_retire_unknown_or_already_retired_is_not_found() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        assert_eq!(
            registry.retire(&store, "ghost").await.unwrap(),
            RetireOutcome::NotFound
        );

        registry.track(&store, "rust", "alice").await.unwrap();
        registry.retire(&store, "rust").await.unwrap();
        assert_eq!(
            registry.retire(&store, "rust").await.unwrap(),
            RetireOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_states() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        registry.track(&store, "rust", "alice").await.unwrap();
        registry.track(&store, "apt", "alice").await.unwrap();
        registry.retire(&store, "apt").await.unwrap();

        assert!(matches!(registry.lookup("RUST"), Lookup::Active(_)));
        assert!(matches!(registry.lookup("apt"), Lookup::Retired(_)));
        assert_eq!(registry.lookup("zig"), Lookup::Unknown);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_edits() {
        let db = Database::new_in_memory().await.unwrap();
        let store = SqliteHistory::new(db.clone());
        let mut registry = TopicRegistry::new();
        registry.track(&store, "rust", "alice").await.unwrap();

        sqlx::query(
            "INSERT INTO topics (canonical, display, added_by, retired) VALUES ('zig', 'Zig', 'ops', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("UPDATE topics SET retired = 1 WHERE canonical = 'rust'")
            .execute(db.pool())
            .await
            .unwrap();

        registry.reload_from_store(&store).await.unwrap();

        assert!(matches!(registry.lookup("zig"), Lookup::Active(_)));
        assert!(matches!(registry.lookup("rust"), Lookup::Retired(_)));
    }

    #[tokio::test]
    async fn test_track_adopts_concurrent_registration() {
        let db = Database::new_in_memory().await.unwrap();
        let store = SqliteHistory::new(db.clone());
        let mut registry = TopicRegistry::load(&store).await.unwrap();

        // Written behind the snapshot's back.
        sqlx::query(
            "INSERT INTO topics (canonical, display, added_by, retired) VALUES ('rust', 'Rust', 'ops', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let outcome = registry.track(&store, "rust", "alice").await.unwrap();
        assert!(matches!(outcome, TrackOutcome::Retired(_)));
        assert_eq!(registry.active_len(), 0);
    }

    #[tokio::test]
    async fn test_active_and_retired_never_share_canonical_form() {
        let store = store().await;
        let mut registry = TopicRegistry::new();
        for raw in ["Rust", "rust", "RUST", "ｒｕｓｔ", "zig", "Zig"] {
            registry.track(&store, raw, "alice").await.unwrap();
        }
        registry.retire(&store, "zig").await.unwrap();
        registry.track(&store, "ZIG", "bob").await.unwrap();

        let mut seen: Vec<&CanonicalString> = registry.active().map(|t| &t.canonical).collect();
        seen.extend(registry.retired().map(|t| &t.canonical));
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(total, 2);
    }
}
