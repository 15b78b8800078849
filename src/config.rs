//! Configuration file loading and resolution against CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use unbot_core::command::DEFAULT_PREFIX;
use unbot_core::db::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS};
use unbot_core::dictionary::DEFAULT_DICTIONARY_PATH;
use unbot_core::monitor::DEFAULT_PRIVILEGED_NICK;
use unbot_core::store::DEFAULT_STORE_TIMEOUT;
use unbot_core::{DatabaseOptions, MonitorSettings, Reporter};

use crate::cli::Args;

/// Database file used when neither the config nor the CLI names one.
const DEFAULT_DATABASE_PATH: &str = "unbot.db";

/// `key = value` file configuration; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// SQLite database path.
    pub database: Option<PathBuf>,
    /// Newline-delimited word list.
    pub dictionary: Option<PathBuf>,
    /// Nick allowed to untrack and reload.
    pub privileged_nick: Option<String>,
    /// Command prefix character.
    pub command_prefix: Option<char>,
    /// Per-call history store timeout in milliseconds (1..=60000).
    pub store_timeout_ms: Option<u64>,
    /// Reply to unauthorized commands.
    pub announce_denials: Option<bool>,
    /// Break up nicks in reports so they don't ping.
    pub ping_guard: Option<bool>,
    /// Fixed replies for special topics.
    pub easter_eggs: Option<bool>,
    /// Database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Database busy timeout in milliseconds (0..=120000).
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.store_timeout_ms
            && !(1..=60_000).contains(&value)
        {
            bail!("Invalid config value for `store_timeout_ms`: {value}. Expected range: 1..=60000");
        }
        if let Some(value) = self.db_max_connections
            && !(1..=20).contains(&value)
        {
            bail!("Invalid config value for `db_max_connections`: {value}. Expected range: 1..=20");
        }
        if let Some(value) = self.db_busy_timeout_ms
            && value > 120_000
        {
            bail!("Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000");
        }
        if let Some(nick) = &self.privileged_nick
            && nick.trim().is_empty()
        {
            bail!("Invalid config value for `privileged_nick`: must not be empty");
        }
        if let Some(prefix) = self.command_prefix
            && (prefix.is_whitespace() || prefix.is_alphanumeric() || prefix == '_')
        {
            bail!("Invalid config value for `command_prefix`: {prefix:?} must be a symbol");
        }
        Ok(())
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub database_options: DatabaseOptions,
    pub dictionary: PathBuf,
    pub command_prefix: char,
    pub store_timeout: Duration,
    pub monitor: MonitorSettings,
    pub reporter: Reporter,
}

impl Settings {
    /// Merges CLI flags over file values over built-in defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: &FileConfig) -> Self {
        let store_timeout = args
            .store_timeout_ms
            .or(file.store_timeout_ms)
            .map_or(DEFAULT_STORE_TIMEOUT, Duration::from_millis);

        Self {
            database: args
                .database
                .clone()
                .or_else(|| file.database.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            database_options: DatabaseOptions {
                max_connections: file.db_max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
                busy_timeout_ms: file.db_busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            },
            dictionary: args
                .dictionary
                .clone()
                .or_else(|| file.dictionary.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DICTIONARY_PATH)),
            command_prefix: args
                .command_prefix
                .or(file.command_prefix)
                .unwrap_or(DEFAULT_PREFIX),
            store_timeout,
            monitor: MonitorSettings {
                privileged_nick: args
                    .privileged_nick
                    .clone()
                    .or_else(|| file.privileged_nick.clone())
                    .unwrap_or_else(|| DEFAULT_PRIVILEGED_NICK.to_string()),
                announce_denials: file.announce_denials.unwrap_or(true),
            },
            reporter: Reporter::new(
                file.ping_guard.unwrap_or(true),
                file.easter_eggs.unwrap_or(true),
            ),
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/unbot/config.toml`
/// 2. `$HOME/.config/unbot/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("unbot").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("unbot")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one when present.
///
/// An explicit path must exist; a missing default file yields empty config.
pub fn load(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return load_file_config(path);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "database" => {
                cfg.database = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "dictionary" => {
                cfg.dictionary = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "privileged_nick" => {
                cfg.privileged_nick = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "command_prefix" => {
                cfg.command_prefix = Some(parse_char(value).with_context(invalid)?);
            }
            "store_timeout_ms" => {
                cfg.store_timeout_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "announce_denials" => {
                cfg.announce_denials = Some(parse_boolean(value).with_context(invalid)?);
            }
            "ping_guard" => {
                cfg.ping_guard = Some(parse_boolean(value).with_context(invalid)?);
            }
            "easter_eggs" => {
                cfg.easter_eggs = Some(parse_boolean(value).with_context(invalid)?);
            }
            "db_max_connections" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("db_max_connections out of range for u32"))?;
                cfg.db_max_connections = Some(n);
            }
            "db_busy_timeout_ms" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("db_busy_timeout_ms out of range for u32"))?;
                cfg.db_busy_timeout_ms = Some(n);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_char(raw_value: &str) -> Result<char> {
    let literal = parse_string_literal(raw_value)?;
    let mut chars = literal.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => bail!("Expected a single character"),
    }
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
