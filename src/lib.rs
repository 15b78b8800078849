//! unbot core library
//!
//! Tracks a configurable set of topics in a chat channel, detects when one is
//! genuinely mentioned, and reports how long it has been since the previous
//! mention.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`normalize`] - NFKC + case-fold canonicalization
//! - [`dictionary`] - Word list used to veto substring matches
//! - [`registry`] - Active/retired topic snapshot (write-through cache)
//! - [`matcher`] - Mention detection and false-positive suppression
//! - [`report`] - Elapsed-time classification and reply text
//! - [`store`] - History store contract, `SQLite` implementation, timeouts
//! - [`db`] - Database connection and schema management
//! - [`command`] - Chat command recognition
//! - [`monitor`] - Per-message state machine tying it all together
//!
//! The chat transport is not part of this crate: it hands
//! [`IncomingMessage`]s to [`Monitor::handle`] and delivers the returned
//! [`Reply`]s.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod db;
pub mod dictionary;
pub mod matcher;
pub mod monitor;
pub mod normalize;
pub mod registry;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use command::{Command, CommandParser};
pub use db::{Database, DatabaseOptions, DbError};
pub use dictionary::{Dictionary, DictionaryError};
pub use matcher::find_mentions;
pub use monitor::{CommandError, IncomingMessage, Monitor, MonitorSettings, Reply};
pub use normalize::{CanonicalString, canonicalize};
pub use registry::{Lookup, RetireOutcome, Topic, TopicRegistry, TrackOutcome};
pub use report::{MentionState, Reporter};
pub use store::{
    HistoryStore, MentionEvent, SqliteHistory, StoreError, StoreErrorKind, TimedStore, TopicRecord,
};
