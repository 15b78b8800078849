//! CLI entry point: a console transport over stdin/stdout.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use unbot_core::{
    CommandParser, Database, Dictionary, IncomingMessage, Monitor, SqliteHistory, TimedStore,
};

mod cli;
mod config;

use cli::Args;
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries replies only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = config::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, &file_config);
    debug!(?settings, "Resolved settings");

    // The matcher cannot suppress false positives without a dictionary.
    let dictionary = Dictionary::load(&settings.dictionary)?;

    let db = Database::with_options(&settings.database, settings.database_options)
        .await
        .with_context(|| format!("Cannot open database '{}'", settings.database.display()))?;
    let store = TimedStore::new(SqliteHistory::new(db.clone()), settings.store_timeout);
    let parser = CommandParser::new(settings.command_prefix)?;
    debug!(
        prefix = %parser.prefix(),
        store_timeout_ms = store.timeout().as_millis(),
        "History store and command parser ready"
    );

    let mut monitor = Monitor::start(
        store,
        dictionary,
        parser,
        settings.reporter.clone(),
        settings.monitor.clone(),
    )
    .await
    .context("Cannot load topics from database")?;

    info!(database = %settings.database.display(), "unbot listening on stdin");

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if stdin.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        // Transport garbage is skipped; only stdin itself failing ends the loop.
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!(error = %err, "Skipping malformed input line (invalid UTF-8)");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let message: IncomingMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Skipping malformed input line");
                continue;
            }
        };

        for reply in monitor.handle(&message, Utc::now()).await {
            let mut encoded = serde_json::to_string(&reply)?;
            encoded.push('\n');
            stdout.write_all(encoded.as_bytes()).await?;
        }
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    db.close().await;

    Ok(())
}
