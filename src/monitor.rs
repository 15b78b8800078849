//! Per-message processing: command dispatch and the mention state machine.
//!
//! [`Monitor::handle`] takes `&mut self`, so one monitor processes events
//! strictly one at a time. Transports that deliver events concurrently must
//! put the monitor behind a single async mutex.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::command::{Command, CommandParser};
use crate::dictionary::Dictionary;
use crate::matcher::find_mentions;
use crate::normalize::canonicalize;
use crate::registry::{Lookup, RetireOutcome, TopicRegistry, TrackOutcome};
use crate::report::{MentionState, Reporter};
use crate::store::{self, HistoryStore, MentionEvent, StoreError};

/// Default identity allowed to retire topics and reload.
pub const DEFAULT_PRIVILEGED_NICK: &str = "whitequark";

/// A chat message handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    /// Author nick.
    pub nick: String,
    /// Channel name; `None` for a direct/private message.
    #[serde(default)]
    pub channel: Option<String>,
    /// Message body.
    pub text: String,
}

impl IncomingMessage {
    /// A message posted in a multi-party channel.
    pub fn in_channel(channel: impl Into<String>, nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            channel: Some(channel.into()),
            text: text.into(),
        }
    }

    /// A direct/private message.
    pub fn private(nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            channel: None,
            text: text.into(),
        }
    }
}

/// Reply text for the transport to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// Channel to post to; `None` replies privately to the sender.
    pub channel: Option<String>,
    /// Nick the reply is addressed to (`nick: text`), if any.
    pub addressee: Option<String>,
    /// Reply body.
    pub text: String,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addressee {
            Some(nick) => write!(f, "{nick}: {}", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// User-facing command failures. `Display` is the reply text.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// `track` on an already-active topic.
    #[error("already tracking topic '{0}'")]
    DuplicateTopic(String),

    /// `track` on a retired topic.
    #[error("not going to track '{0}' nope sorry")]
    RetiredTopic(String),

    /// Privileged command from someone else.
    #[error("you're not {privileged} so no")]
    UnauthorizedCommand {
        /// The identity that would have been allowed.
        privileged: String,
    },

    /// `untrack`/`since` on a topic that is not active.
    #[error("not tracking topic '{0}'")]
    UnknownTopic(String),

    /// The history store failed or timed out; nothing was changed.
    #[error("couldn't reach the history store, try again later")]
    StoreUnavailable(#[from] StoreError),
}

/// Policy knobs for command handling.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Identity allowed to run `untrack` and `reload`.
    pub privileged_nick: String,
    /// Reply to unauthorized commands instead of ignoring them.
    pub announce_denials: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            privileged_nick: DEFAULT_PRIVILEGED_NICK.to_string(),
            announce_denials: true,
        }
    }
}

/// The topic monitor: registry snapshot, dictionary and history store.
#[derive(Debug)]
pub struct Monitor<S> {
    store: S,
    registry: TopicRegistry,
    dictionary: Dictionary,
    parser: CommandParser,
    reporter: Reporter,
    settings: MonitorSettings,
}

impl<S: HistoryStore> Monitor<S> {
    /// Builds a monitor, loading the registry snapshot from `store`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the topic table cannot be read.
    pub async fn start(
        store: S,
        dictionary: Dictionary,
        parser: CommandParser,
        reporter: Reporter,
        settings: MonitorSettings,
    ) -> store::Result<Self> {
        let registry = TopicRegistry::load(&store).await?;
        info!(
            active = registry.active_len(),
            dictionary = dictionary.len(),
            "Monitor started"
        );
        Ok(Self {
            store,
            registry,
            dictionary,
            parser,
            reporter,
            settings,
        })
    }

    /// Current registry snapshot.
    #[must_use]
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// The history store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes one message and returns the replies to send, in order.
    #[instrument(skip_all, fields(nick = %message.nick, channel = ?message.channel))]
    pub async fn handle(&mut self, message: &IncomingMessage, now: DateTime<Utc>) -> Vec<Reply> {
        if let Some(command) = self.parser.parse(&message.text) {
            debug!(?command, "Dispatching command");
            let text = match self.run_command(command, &message.nick, now).await {
                Ok(text) => Some(text),
                Err(CommandError::UnauthorizedCommand { .. }) if !self.settings.announce_denials => {
                    None
                }
                Err(err) => {
                    if let CommandError::StoreUnavailable(cause) = &err {
                        log_store_failure(cause, "Command failed on history store");
                    }
                    Some(err.to_string())
                }
            };
            return text
                .map(|text| Reply {
                    channel: message.channel.clone(),
                    addressee: Some(message.nick.clone()),
                    text,
                })
                .into_iter()
                .collect();
        }

        if message.channel.is_none()
            || message.text.trim().is_empty()
            || self.parser.is_command_like(&message.text)
        {
            return Vec::new();
        }

        self.record_mentions(&message.text, &message.nick, now)
            .await
            .into_iter()
            .map(|text| Reply {
                channel: message.channel.clone(),
                addressee: None,
                text,
            })
            .collect()
    }

    /// Runs one command on behalf of `nick`, returning the success reply.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] whose `Display` is the failure reply.
    pub async fn run_command(
        &mut self,
        command: Command,
        nick: &str,
        now: DateTime<Utc>,
    ) -> Result<String, CommandError> {
        match command {
            Command::Track(topic) => {
                match self.registry.track(&self.store, &topic, nick).await? {
                    TrackOutcome::Tracked(topic) => Ok(self.reporter.tracked(&topic.display)),
                    TrackOutcome::AlreadyActive(topic) => {
                        Err(CommandError::DuplicateTopic(topic.display))
                    }
                    TrackOutcome::Retired(topic) => Err(CommandError::RetiredTopic(topic.display)),
                }
            }
            Command::Untrack(topic) => {
                self.authorize(nick)?;
                match self.registry.retire(&self.store, &topic).await? {
                    RetireOutcome::Retired(retired) => Ok(self
                        .reporter
                        .untracked(&retired.display, &retired.added_by)),
                    RetireOutcome::NotFound => Err(CommandError::UnknownTopic(topic)),
                }
            }
            Command::Reload => {
                self.authorize(nick)?;
                self.registry.reload_from_store(&self.store).await?;
                info!(active = self.registry.active_len(), "Reloaded topics from store");
                Ok(self.reporter.reloaded(self.registry.active_len()))
            }
            Command::Since(topic) => {
                let Lookup::Active(active) = self.registry.lookup(&topic) else {
                    return Err(CommandError::UnknownTopic(topic));
                };
                let latest = self.store.latest_mention(active.canonical.as_str()).await?;
                Ok(self.reporter.since(&active.display, latest.as_ref(), now))
            }
        }
    }

    fn authorize(&self, nick: &str) -> Result<(), CommandError> {
        if canonicalize(nick) == canonicalize(&self.settings.privileged_nick) {
            Ok(())
        } else {
            warn!(nick, "Rejected privileged command");
            Err(CommandError::UnauthorizedCommand {
                privileged: self.settings.privileged_nick.clone(),
            })
        }
    }

    /// Runs the mention pipeline for a channel message and returns report texts.
    ///
    /// For every distinct mentioned topic: read the latest event, decide the
    /// report, then append the new event. A topic whose store calls fail gets a
    /// failure reply instead of its report.
    pub async fn record_mentions(&self, text: &str, nick: &str, now: DateTime<Utc>) -> Vec<String> {
        let mut replies = Vec::new();

        for topic in find_mentions(text, &self.registry, &self.dictionary) {
            let key = topic.canonical.as_str();

            let previous = match self.store.latest_mention(key).await {
                Ok(previous) => previous,
                Err(err) => {
                    let context = format!("Failed to read latest mention of '{}'", topic.display);
                    log_store_failure(&err, &context);
                    replies.push(self.reporter.mention_failed(&topic.display));
                    continue;
                }
            };

            let state = MentionState::classify(previous.as_ref(), now);
            debug!(topic = %topic.display, ?state, "Confirmed mention");
            let report = self
                .reporter
                .mention(&topic.display, key, state, previous.as_ref(), now);

            let event = MentionEvent {
                topic: key.to_string(),
                posted_by: nick.to_string(),
                posted_at: now,
            };
            if let Err(err) = self.store.append_mention(&event).await {
                let context = format!("Failed to record mention of '{}'", topic.display);
                log_store_failure(&err, &context);
                replies.push(self.reporter.mention_failed(&topic.display));
                continue;
            }

            replies.extend(report);
        }

        replies
    }
}

/// Timeouts and lock contention clear up on their own; anything else needs an operator.
fn log_store_failure(err: &StoreError, context: &str) {
    if err.is_transient() {
        warn!(error = %err, kind = ?err.database_kind(), transient = true, "{context}");
    } else {
        error!(error = %err, kind = ?err.database_kind(), transient = false, "{context}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::DEFAULT_PREFIX;
    use crate::db::Database;
    use crate::store::SqliteHistory;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    async fn monitor() -> Monitor<SqliteHistory> {
        let store = SqliteHistory::new(Database::new_in_memory().await.unwrap());
        Monitor::start(
            store,
            Dictionary::from_words(["capture", "love", "moments"]),
            CommandParser::new(DEFAULT_PREFIX).unwrap(),
            Reporter::new(false, true),
            MonitorSettings::default(),
        )
        .await
        .unwrap()
    }

    fn say(nick: &str, text: &str) -> IncomingMessage {
        IncomingMessage::in_channel("#unbot", nick, text)
    }

    #[test]
    fn test_reply_display_prefixes_addressee() {
        let reply = Reply {
            channel: Some("#c".to_string()),
            addressee: Some("alice".to_string()),
            text: "now tracking topic 'rust'".to_string(),
        };
        assert_eq!(reply.to_string(), "alice: now tracking topic 'rust'");
    }

    #[tokio::test]
    async fn test_track_reply_is_addressed() {
        let mut monitor = monitor().await;
        let replies = monitor.handle(&say("alice", "!track Rust"), t0()).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].addressee.as_deref(), Some("alice"));
        assert_eq!(replies[0].text, "now tracking topic 'Rust'");
    }

    #[tokio::test]
    async fn test_command_errors_become_replies() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        let dup = monitor.handle(&say("bob", "!track RUST"), t0()).await;
        assert_eq!(dup[0].text, "already tracking topic 'rust'");

        let unknown = monitor.handle(&say("bob", "!since zig"), t0()).await;
        assert_eq!(unknown[0].text, "not tracking topic 'zig'");
    }

    #[tokio::test]
    async fn test_unauthorized_commands_do_not_mutate() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        let denied = monitor.handle(&say("mallory", "!untrack rust"), t0()).await;
        assert_eq!(denied[0].text, "you're not whitequark so no");
        assert!(matches!(monitor.registry().lookup("rust"), Lookup::Active(_)));

        let denied = monitor.handle(&say("mallory", "!reload"), t0()).await;
        assert_eq!(denied[0].text, "you're not whitequark so no");
    }

    #[tokio::test]
    async fn test_denials_can_be_silent() {
        let store = SqliteHistory::new(Database::new_in_memory().await.unwrap());
        let mut monitor = Monitor::start(
            store,
            Dictionary::from_words(["word"]),
            CommandParser::new(DEFAULT_PREFIX).unwrap(),
            Reporter::default(),
            MonitorSettings {
                privileged_nick: "root".to_string(),
                announce_denials: false,
            },
        )
        .await
        .unwrap();

        assert!(monitor.handle(&say("mallory", "!reload"), t0()).await.is_empty());
        let ok = monitor.handle(&say("root", "!reload"), t0()).await;
        assert_eq!(ok[0].text, "reloaded! tracking 0 topics");
    }

    #[tokio::test]
    async fn test_privileged_untrack() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track apt"), t0()).await;

        let replies = monitor.handle(&say("whitequark", "!untrack APT"), t0()).await;
        assert_eq!(replies[0].text, "untracked topic 'apt' (added by alice)");

        let again = monitor.handle(&say("bob", "!track apt"), t0()).await;
        assert_eq!(again[0].text, "not going to track 'apt' nope sorry");
    }

    #[tokio::test]
    async fn test_private_messages_are_not_scanned() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        let replies = monitor
            .handle(&IncomingMessage::private("bob", "rust rust rust"), t0())
            .await;
        assert!(replies.is_empty());
        assert!(monitor.store().latest_mention("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commands_work_in_private() {
        let mut monitor = monitor().await;
        let replies = monitor
            .handle(&IncomingMessage::private("alice", "!track rust"), t0())
            .await;
        assert_eq!(replies[0].channel, None);
        assert_eq!(replies[0].text, "now tracking topic 'rust'");
    }

    #[tokio::test]
    async fn test_prefixed_messages_are_not_scanned() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        assert!(monitor.handle(&say("bob", "!rust is cool"), t0()).await.is_empty());
        assert!(monitor.handle(&say("bob", "   !rust"), t0()).await.is_empty());
        assert!(monitor.store().latest_mention("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mention_timeline() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        let first = monitor.handle(&say("bob", "I like rust"), t0()).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "first mention of 'rust'! yay!");
        assert_eq!(first[0].addressee, None);

        let soon = t0() + TimeDelta::minutes(10);
        assert!(monitor.handle(&say("carol", "rust again"), soon).await.is_empty());
        let latest = monitor.store().latest_mention("rust").await.unwrap().unwrap();
        assert_eq!(latest.posted_by, "carol");

        let later = soon + TimeDelta::hours(5);
        let stale = monitor.handle(&say("dave", "rust!"), later).await;
        assert_eq!(stale.len(), 1);
        assert!(stale[0].text.starts_with("*flips* time since previous mention of 'rust': 5 hours"));
        assert!(stale[0].text.ends_with("(mentioned by carol)"));
    }

    #[tokio::test]
    async fn test_since_reports_latest_mention() {
        let mut monitor = monitor().await;
        monitor.handle(&say("alice", "!track rust"), t0()).await;

        let none = monitor.handle(&say("bob", "!since rust"), t0()).await;
        assert_eq!(none[0].text, "no one has mentioned 'rust' so far");

        monitor.handle(&say("carol", "rust"), t0()).await;
        let since = monitor
            .handle(&say("bob", "!since Rust"), t0() + TimeDelta::hours(2))
            .await;
        assert_eq!(
            since[0].text,
            "time since last mention of 'rust': 2 hours (mentioned by carol)"
        );
    }
}
