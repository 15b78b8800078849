//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Track topics in a chat channel and report how long it has been since
/// anyone mentioned them.
///
/// Reads newline-delimited JSON messages (`{"nick", "channel", "text"}`) from
/// stdin and writes one JSON reply per line to stdout.
#[derive(Parser, Debug)]
#[command(name = "unbot")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/unbot/config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database holding topics and mentions
    #[arg(short = 'd', long)]
    pub database: Option<PathBuf>,

    /// Newline-delimited dictionary word list
    #[arg(long)]
    pub dictionary: Option<PathBuf>,

    /// Nick allowed to untrack topics and reload
    #[arg(long)]
    pub privileged_nick: Option<String>,

    /// Command prefix character
    #[arg(long)]
    pub command_prefix: Option<char>,

    /// Per-call history store timeout in milliseconds (1-60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=60000))]
    pub store_timeout_ms: Option<u64>,
}
