//! Mention detection: decides which tracked topics a message genuinely mentions.
//!
//! A topic is a candidate when its canonical form is a substring of the
//! canonical message. Each maximal run of word characters around an
//! occurrence is a *candidate word*, and the topic counts as mentioned when
//! any candidate word passes [`judge_candidate`].
//!
//! The dictionary and length thresholds are tuned heuristics: they keep
//! `apt` out of `capture` and `efi` out of `edefic` while letting `fistula`
//! match `fistulae` and `efi` match `uefi`.

use tracing::{debug, trace};

use crate::dictionary::Dictionary;
use crate::normalize::{CanonicalString, canonicalize, is_word_char};
use crate::registry::{Topic, TopicRegistry};

/// How a single candidate word was judged against a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate is exactly the topic.
    Exact,
    /// The candidate extends the topic but passes both filters.
    Extended,
    /// The candidate is a dictionary word more than one character longer than the topic.
    DictionaryWord,
    /// The candidate is at least twice as long as the topic.
    TooLong,
}

impl Verdict {
    /// True when the candidate counts as a mention.
    #[must_use]
    pub fn is_mention(self) -> bool {
        matches!(self, Self::Exact | Self::Extended)
    }
}

/// Judges one candidate word (already canonical) against a topic.
#[must_use]
pub fn judge_candidate(candidate: &str, topic: &CanonicalString, dictionary: &Dictionary) -> Verdict {
    if candidate == topic.as_str() {
        return Verdict::Exact;
    }

    let candidate_len = candidate.chars().count();
    let topic_len = topic.char_len();

    if dictionary.contains(candidate) && candidate_len > topic_len + 1 {
        return Verdict::DictionaryWord;
    }
    if candidate_len >= 2 * topic_len {
        return Verdict::TooLong;
    }
    Verdict::Extended
}

/// Returns every distinct maximal word-character run overlapping an occurrence
/// of `needle` in `haystack`, in order of first appearance.
///
/// Occurrences may overlap each other. Both arguments are expected to be canonical.
#[must_use]
pub fn candidate_words<'h>(haystack: &'h str, needle: &str) -> Vec<&'h str> {
    let mut candidates: Vec<&'h str> = Vec::new();
    if needle.is_empty() {
        return candidates;
    }

    let mut from = 0;
    while let Some(offset) = haystack[from..].find(needle) {
        let start = from + offset;
        let end = start + needle.len();

        let run_start = haystack[..start]
            .char_indices()
            .rev()
            .take_while(|&(_, c)| is_word_char(c))
            .last()
            .map_or(start, |(index, _)| index);
        let run_end = haystack[end..]
            .char_indices()
            .find(|&(_, c)| !is_word_char(c))
            .map_or(haystack.len(), |(index, _)| end + index);

        let candidate = &haystack[run_start..run_end];
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }

        // Step one character so overlapping occurrences are visited.
        let step = haystack[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }

    candidates
}

/// Returns true when `topic` is genuinely mentioned in `canonical_message`.
#[must_use]
pub fn mentions_topic(canonical_message: &str, topic: &CanonicalString, dictionary: &Dictionary) -> bool {
    if topic.is_empty() || !canonical_message.contains(topic.as_str()) {
        return false;
    }

    for candidate in candidate_words(canonical_message, topic.as_str()) {
        let verdict = judge_candidate(candidate, topic, dictionary);
        trace!(topic = %topic, candidate, ?verdict, "Judged candidate word");
        if verdict.is_mention() {
            return true;
        }
    }
    false
}

/// Returns the distinct active topics genuinely mentioned in `message`,
/// in registration order. Each topic appears at most once.
#[must_use]
pub fn find_mentions<'r>(
    message: &str,
    registry: &'r TopicRegistry,
    dictionary: &Dictionary,
) -> Vec<&'r Topic> {
    let canonical = canonicalize(message);
    let found: Vec<&Topic> = registry
        .active()
        .filter(|topic| mentions_topic(canonical.as_str(), &topic.canonical, dictionary))
        .collect();

    if !found.is_empty() {
        debug!(
            topics = ?found.iter().map(|t| t.display.as_str()).collect::<Vec<_>>(),
            "Found mentions"
        );
    }
    found
}
