//! End-to-end CLI integration tests
//!
//! These tests use assert_cmd to run the toolshed binary against a
//! throwaway home directory, whitelist and outbox, so no mail ever leaves
//! the machine and the user's own configuration is never read.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{create_dir_all, read_to_string, write};
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper for setting up an isolated CLI environment
pub struct CliTestEnvironment {
    pub temp_dir: TempDir,
}

impl CliTestEnvironment {
    pub fn new(whitelist: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let env = Self { temp_dir };

        create_dir_all(env.path("home/.config")).unwrap();
        create_dir_all(env.path("mail")).unwrap();
        write(env.path("whitelist"), whitelist).unwrap();
        write(
            env.config_file(),
            format!(
                "[mail]\nfrom = \"sender@example.com\"\nwhitelist = \"{}\"\ncredentials = \"{}\"\ndriver = \"outbox\"\n",
                env.path("whitelist").display(),
                env.path("credentials").display(),
            ),
        )
        .unwrap();
        env
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn config_file(&self) -> PathBuf {
        self.path("toolshed-test.toml")
    }

    pub fn outbox(&self) -> PathBuf {
        self.path("mail/outbox.mbox")
    }

    /// The binary with HOME, XDG and toolshed variables pointed at the temp dir.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("toolshed").unwrap();
        cmd.current_dir(self.temp_dir.path())
            .env("HOME", self.path("home"))
            .env("XDG_CONFIG_HOME", self.path("home/.config"))
            .env("OUTBOX_PATH", self.outbox())
            .env_remove("TOOLSHED_LOG")
            .env_remove("RUST_LOG")
            .env_remove("TOOLSHED__MAIL__FROM")
            .env_remove("TOOLSHED__MAIL__DRIVER")
            .env_remove("TOOLSHED__MAIL__WHITELIST")
            .arg("--config")
            .arg(self.config_file());
        cmd
    }
}

const WHITELIST: &str = "\
# people I may email
me@example.com self me
team@example.com work
";

#[test]
fn test_no_arguments_shows_overview() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .assert()
        .success()
        .stdout(predicate::str::contains("toolshed send"))
        .stdout(predicate::str::contains("toolshed setup"));
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("toolshed").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("send"))
        .stdout(predicate::str::contains("aliases"))
        .stdout(predicate::str::contains("drivers"))
        .stdout(predicate::str::contains("search"));
}

#[test]
fn test_missing_subject_is_usage_error() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command().args(["send", "self"]).assert().code(2);
}

#[test]
fn test_dry_run_prints_message_and_sends_nothing() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .args(["send", "self", "-s", "Hi", "-b", "Hello", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains("To: me@example.com"))
        .stdout(predicate::str::contains("Subject: Hi"))
        .stdout(predicate::str::contains("Hello"));

    assert!(!env.outbox().exists());
}

#[test]
fn test_send_appends_to_outbox() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .args(["send", "work", "-s", "Status", "-f", "-"])
        .write_stdin("All green.\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 'Status' to team@example.com via outbox"));

    let mbox = read_to_string(env.outbox()).unwrap();
    assert!(mbox.starts_with("From sender@example.com "));
    assert!(mbox.contains("To: team@example.com"));
    assert!(mbox.contains("All green."));
}

#[test]
fn test_unknown_alias_lists_known_aliases() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .args(["send", "boss", "-s", "Hi", "-b", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("boss"))
        .stderr(predicate::str::contains("self, me"))
        .stderr(predicate::str::contains("work"));

    assert!(!env.outbox().exists());
}

#[test]
fn test_duplicate_alias_is_refused() {
    let env = CliTestEnvironment::new("a@example.com work\nb@example.com work\n");

    env.command()
        .args(["send", "work", "-s", "Hi", "-b", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("work"));

    assert!(!env.outbox().exists());
}

#[test]
fn test_missing_whitelist_exits_with_config_code() {
    let env = CliTestEnvironment::new(WHITELIST);
    std::fs::remove_file(env.path("whitelist")).unwrap();

    env.command()
        .args(["send", "self", "-s", "Hi", "-b", "x"])
        .assert()
        .code(3);
}

#[test]
fn test_missing_config_file_exits_with_config_code() {
    let env = CliTestEnvironment::new(WHITELIST);

    Command::cargo_bin("toolshed")
        .unwrap()
        .current_dir(env.temp_dir.path())
        .env("HOME", env.path("home"))
        .env("XDG_CONFIG_HOME", env.path("home/.config"))
        .args(["--config", "does-not-exist.toml", "aliases"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn test_missing_outbox_path_is_config_error() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .env_remove("OUTBOX_PATH")
        .args(["send", "self", "-s", "Hi", "-b", "x", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("OUTBOX_PATH"));
}

#[test]
fn test_aliases_lists_groups_and_check_flags_conflicts() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .arg("aliases")
        .assert()
        .success()
        .stdout(predicate::str::contains("self, me → me@example.com"))
        .stdout(predicate::str::contains("work → team@example.com"));

    write(env.path("whitelist"), "a@example.com work\nb@example.com work\n").unwrap();
    env.command().args(["aliases", "--check"]).assert().code(1);
}

#[test]
fn test_drivers_listing_and_help() {
    let env = CliTestEnvironment::new(WHITELIST);

    env.command()
        .arg("drivers")
        .assert()
        .success()
        .stdout(predicate::str::contains("outbox (default)"))
        .stdout(predicate::str::contains("gmail"));

    env.command()
        .args(["drivers", "pigeon"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pigeon"));
}

#[test]
fn test_setup_writes_templates_into_config_dir() {
    let env = CliTestEnvironment::new(WHITELIST);
    let setup_whitelist = env.path("home/.config/toolshed/whitelist");

    env.command()
        .env("TOOLSHED__MAIL__WHITELIST", &setup_whitelist)
        .env("TOOLSHED__MAIL__CREDENTIALS", env.path("home/.config/toolshed/credentials"))
        .args(["setup", "--from", "me@example.com"])
        .assert()
        .success();

    assert!(env.path("home/.config/toolshed/config.toml").exists());
    assert!(read_to_string(&setup_whitelist)
        .unwrap()
        .contains("me@example.com self me"));

    // A second run leaves the files alone.
    write(&setup_whitelist, "kept@example.com self\n").unwrap();
    env.command()
        .env("TOOLSHED__MAIL__WHITELIST", &setup_whitelist)
        .env("TOOLSHED__MAIL__CREDENTIALS", env.path("home/.config/toolshed/credentials"))
        .arg("setup")
        .assert()
        .success()
        .stdout(predicate::str::contains("leaving it untouched"));
    assert_eq!(
        read_to_string(&setup_whitelist).unwrap(),
        "kept@example.com self\n"
    );
}
