//! Reply formatting and elapsed-time classification.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_humanize::{Accuracy, HumanTime, Tense};

use crate::store::MentionEvent;

/// Re-mentions closer together than this are recorded silently.
pub const RECENT_WINDOW: TimeDelta = TimeDelta::hours(4);

/// Gaps at least this long get the stronger phrasing.
pub const VERY_STALE_AFTER: TimeDelta = TimeDelta::days(3);

/// Zero-width joiner inserted into nicks so reports don't ping their owner.
const ZERO_WIDTH_JOINER: char = '\u{200d}';

/// Topic that gets a fixed reply instead of an elapsed-time report.
const NICE_TOPIC: &str = "69";

/// Where a confirmed mention falls relative to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionState {
    /// The topic has never been mentioned.
    NoPriorMention,
    /// Previous mention was less than [`RECENT_WINDOW`] ago.
    RecentMention,
    /// Previous mention was at least [`RECENT_WINDOW`] ago.
    StaleMention,
    /// Previous mention was at least [`VERY_STALE_AFTER`] ago.
    VeryStale,
}

impl MentionState {
    /// Classifies a mention at `now` given the previous event for the topic.
    #[must_use]
    pub fn classify(previous: Option<&MentionEvent>, now: DateTime<Utc>) -> Self {
        let Some(previous) = previous else {
            return Self::NoPriorMention;
        };
        let elapsed = now - previous.posted_at;
        if elapsed < RECENT_WINDOW {
            Self::RecentMention
        } else if elapsed < VERY_STALE_AFTER {
            Self::StaleMention
        } else {
            Self::VeryStale
        }
    }
}

/// Humanized, lower-cased elapsed time, e.g. `3 days and 4 hours`.
///
/// Sub-second precision is dropped and negative gaps (clock skew) clamp to zero.
#[must_use]
pub fn humanize_elapsed(elapsed: TimeDelta) -> String {
    let seconds = elapsed.num_seconds().max(0);
    HumanTime::from(TimeDelta::seconds(seconds))
        .to_text_en(Accuracy::Precise, Tense::Present)
        .to_lowercase()
}

/// Builds every user-facing reply string.
#[derive(Debug, Clone)]
pub struct Reporter {
    ping_guard: bool,
    easter_eggs: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self {
            ping_guard: true,
            easter_eggs: true,
        }
    }
}

impl Reporter {
    /// Creates a reporter.
    ///
    /// `ping_guard` breaks up author nicks in reports; `easter_eggs` enables
    /// fixed replies for special topics.
    #[must_use]
    pub fn new(ping_guard: bool, easter_eggs: bool) -> Self {
        Self {
            ping_guard,
            easter_eggs,
        }
    }

    /// Renders a nick for embedding in a report.
    #[must_use]
    pub fn nick(&self, nick: &str) -> String {
        if !self.ping_guard {
            return nick.to_string();
        }
        let mut chars = nick.chars();
        match chars.next() {
            Some(first) if chars.as_str().is_empty() => first.to_string(),
            Some(first) => format!("{first}{ZERO_WIDTH_JOINER}{}", chars.as_str()),
            None => String::new(),
        }
    }

    /// Report for a confirmed mention, or `None` when it should pass silently.
    #[must_use]
    pub fn mention(
        &self,
        display: &str,
        canonical: &str,
        state: MentionState,
        previous: Option<&MentionEvent>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if state == MentionState::RecentMention {
            return None;
        }
        if self.easter_eggs && canonical == NICE_TOPIC {
            return Some("nice".to_string());
        }

        match (state, previous) {
            (MentionState::StaleMention, Some(previous)) => Some(format!(
                "*flips* time since previous mention of '{display}': {} (mentioned by {})",
                humanize_elapsed(now - previous.posted_at),
                self.nick(&previous.posted_by)
            )),
            (MentionState::VeryStale, Some(previous)) => Some(format!(
                "*flips table* it has been {} since anyone mentioned '{display}' (last: {})",
                humanize_elapsed(now - previous.posted_at),
                self.nick(&previous.posted_by)
            )),
            _ => Some(format!("first mention of '{display}'! yay!")),
        }
    }

    /// Reply to `!since` for a tracked topic.
    #[must_use]
    pub fn since(&self, display: &str, latest: Option<&MentionEvent>, now: DateTime<Utc>) -> String {
        match latest {
            Some(latest) => format!(
                "time since last mention of '{display}': {} (mentioned by {})",
                humanize_elapsed(now - latest.posted_at),
                self.nick(&latest.posted_by)
            ),
            None => format!("no one has mentioned '{display}' so far"),
        }
    }

    #[must_use]
    pub fn tracked(&self, display: &str) -> String {
        format!("now tracking topic '{display}'")
    }

    #[must_use]
    pub fn untracked(&self, display: &str, added_by: &str) -> String {
        format!("untracked topic '{display}' (added by {})", self.nick(added_by))
    }

    #[must_use]
    pub fn reloaded(&self, active: usize) -> String {
        format!("reloaded! tracking {active} topics")
    }

    /// Reply when a confirmed mention could not be recorded.
    #[must_use]
    pub fn mention_failed(&self, display: &str) -> String {
        format!("couldn't record mention of '{display}', history store unavailable")
    }
}
