//! End-to-end CLI tests for the unbot binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Temp workspace with a dictionary and an isolated config home.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("words"), "capture\nlove\nmoments\n").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("unbot").unwrap();
        cmd.env("XDG_CONFIG_HOME", self.dir.path())
            .env_remove("RUST_LOG")
            .arg("--dictionary")
            .arg(self.path("words"))
            .arg("--database")
            .arg(self.path("unbot.db"));
        cmd
    }
}

fn line(nick: &str, text: &str) -> String {
    serde_json::json!({ "nick": nick, "channel": "#test", "text": text }).to_string() + "\n"
}

fn config_home(dir: &Path) -> PathBuf {
    let home = dir.join("unbot");
    std::fs::create_dir_all(&home).unwrap();
    home.join("config.toml")
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("unbot").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Track topics in a chat channel"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("unbot").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("unbot"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("unbot").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_empty_stdin_exits_cleanly() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .arg("-q")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_binary_missing_dictionary_fails() {
    let fixture = Fixture::new();
    let mut cmd = Command::cargo_bin("unbot").unwrap();
    cmd.env("XDG_CONFIG_HOME", fixture.path("config"))
        .arg("--dictionary")
        .arg(fixture.path("no-such-words"))
        .arg("--database")
        .arg(fixture.path("unbot.db"))
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-words"));
}

#[test]
fn test_binary_tracks_and_reports_mentions() {
    let fixture = Fixture::new();
    let input = [
        line("alice", "!track rust"),
        line("bob", "I love to capture moments"),
        line("bob", "rust is neat"),
    ]
    .concat();

    fixture
        .cmd()
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("now tracking topic 'rust'"))
        .stdout(predicate::str::contains("\"addressee\":\"alice\""))
        .stdout(predicate::str::contains("first mention of 'rust'! yay!"));
}

#[test]
fn test_binary_skips_malformed_lines() {
    let fixture = Fixture::new();
    let input = format!("not json at all\n{}", line("alice", "!track zig"));

    fixture
        .cmd()
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("now tracking topic 'zig'"))
        .stderr(predicate::str::contains("malformed"));
}

#[test]
fn test_binary_survives_invalid_utf8_line() {
    let fixture = Fixture::new();
    let mut input = line("alice", "!track rust").into_bytes();
    input.extend_from_slice(b"{\"nick\":\"bob\",\"channel\":\"#test\",\"text\":\"caf\xe9 time\"}\n");
    input.extend_from_slice(line("carol", "rust").as_bytes());

    fixture
        .cmd()
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("now tracking topic 'rust'"))
        .stdout(predicate::str::contains("first mention of 'rust'! yay!"))
        .stderr(predicate::str::contains("invalid UTF-8"));
}

#[test]
fn test_binary_topics_persist_between_runs() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .write_stdin(line("alice", "!track rust"))
        .assert()
        .success();

    fixture
        .cmd()
        .write_stdin(line("bob", "!track Rust"))
        .assert()
        .success()
        .stdout(predicate::str::contains("already tracking topic 'rust'"));
}

#[test]
fn test_binary_reads_config_file() {
    let fixture = Fixture::new();
    std::fs::write(
        config_home(fixture.dir.path()),
        "privileged_nick = \"ops\"\ncommand_prefix = \".\"\nping_guard = false\n",
    )
    .unwrap();
    let input = [line("alice", ".track rust"), line("ops", ".untrack rust")].concat();

    fixture
        .cmd()
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("untracked topic 'rust' (added by alice)"));
}
