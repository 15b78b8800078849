//! Chat command recognition.
//!
//! | Pattern | Command |
//! |---|---|
//! | `!track <topic>` | [`Command::Track`] |
//! | `!untrack <topic>` | [`Command::Untrack`] |
//! | `!reload` | [`Command::Reload`] |
//! | `!since <topic>` | [`Command::Since`] |
//!
//! The prefix character is configurable. Any message whose first
//! non-whitespace character is the prefix is excluded from mention scanning,
//! whether or not it parses as a command.

use regex::Regex;
use thiserror::Error;

/// Default command prefix.
pub const DEFAULT_PREFIX: char = '!';

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start tracking a topic.
    Track(String),
    /// Permanently retire a topic (privileged).
    Untrack(String),
    /// Rebuild the topic snapshot from the store (privileged).
    Reload,
    /// Report the latest mention of a topic.
    Since(String),
}

/// Errors building a [`CommandParser`].
#[derive(Debug, Error)]
pub enum CommandParserError {
    /// The prefix cannot start a chat command.
    #[error("invalid command prefix {0:?}: must be a single non-whitespace, non-word character")]
    InvalidPrefix(char),

    /// The generated pattern failed to compile.
    #[error("failed to compile command pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Recognizes commands for a given prefix.
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefix: char,
    with_topic: Regex,
    reload: Regex,
}

impl CommandParser {
    /// Builds a parser for `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandParserError::InvalidPrefix`] for whitespace or word characters.
    pub fn new(prefix: char) -> Result<Self, CommandParserError> {
        if prefix.is_whitespace() || prefix.is_alphanumeric() || prefix == '_' {
            return Err(CommandParserError::InvalidPrefix(prefix));
        }
        let escaped = regex::escape(&prefix.to_string());
        let with_topic = Regex::new(&format!(r"^\s*{escaped}(track|untrack|since)\s+(.*\S)\s*$"))?;
        let reload = Regex::new(&format!(r"^\s*{escaped}reload\s*$"))?;
        Ok(Self {
            prefix,
            with_topic,
            reload,
        })
    }

    /// The configured prefix character.
    #[must_use]
    pub fn prefix(&self) -> char {
        self.prefix
    }

    /// True when the message is addressed to the command surface and must not be scanned.
    #[must_use]
    pub fn is_command_like(&self, text: &str) -> bool {
        text.trim_start().starts_with(self.prefix)
    }

    /// Parses a command, returning `None` for anything else.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<Command> {
        if self.reload.is_match(text) {
            return Some(Command::Reload);
        }

        let captures = self.with_topic.captures(text)?;
        let topic = captures.get(2)?.as_str().trim().to_string();
        match captures.get(1)?.as_str() {
            "track" => Some(Command::Track(topic)),
            "untrack" => Some(Command::Untrack(topic)),
            "since" => Some(Command::Since(topic)),
            _ => None,
        }
    }
}
