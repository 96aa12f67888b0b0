use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;
use std::process::{Command, Output};

use issue_archiver::StateStore;

// Integration tests for issue-archiver CLI commands
// These tests run the actual binary and verify its behavior

fn archiver(config_home: &TempDir) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_issue-archiver"));
    command
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    command
}

fn run(command: &mut Command) -> (Output, String, String) {
    let output = command.output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    (output, stdout, stderr)
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let (output, stdout, _) = run(archiver(&home).arg("--help"));

    assert!(output.status.success());
    assert!(predicate::str::contains("github").eval(&stdout));
    assert!(predicate::str::contains("status").eval(&stdout));
}

#[test]
fn test_github_help_lists_flags() {
    let home = TempDir::new().unwrap();
    let (output, stdout, _) = run(archiver(&home).args(["github", "--help"]));

    assert!(output.status.success());
    for flag in [
        "--token",
        "--org",
        "--repo",
        "--date",
        "--resume",
        "--no-resume",
        "--archived",
        "--no-archived",
        "--closed",
        "--no-closed",
        "--save-dir",
        "--formats",
        "--url",
    ] {
        assert!(stdout.contains(flag), "help is missing {}", flag);
    }
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let (output, stdout, _) = run(archiver(&home).arg("--version"));

    assert!(output.status.success());
    assert!(stdout.contains("issue-archiver"));
}

#[test]
fn test_org_and_repo_together_are_rejected() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(archiver(&home).args([
        "github",
        "--token",
        "unused",
        "--org",
        "acme",
        "--repo",
        "acme/widgets",
        "--url",
        "http://127.0.0.1:9/",
    ]));

    assert!(!output.status.success());
    assert!(predicate::str::contains("Cannot specify both").eval(&stderr));
}

#[test]
fn test_missing_selection_is_rejected() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(archiver(&home).args(["github", "--token", "unused"]));

    assert!(!output.status.success());
    assert!(stderr.contains("--org"));
}

#[test]
fn test_malformed_repository_is_rejected() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(archiver(&home).args([
        "github",
        "--token",
        "unused",
        "--repo",
        "not-a-slug",
    ]));

    assert!(!output.status.success());
    assert!(stderr.contains("owner/name"));
}

#[test]
fn test_token_is_required() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(archiver(&home).args(["github", "--org", "acme"]));

    assert!(!output.status.success());
    assert!(stderr.contains("--token"));
}

#[test]
fn test_invalid_date_is_rejected() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(archiver(&home).args([
        "github",
        "--token",
        "unused",
        "--org",
        "acme",
        "--date",
        "01/02/2024",
    ]));

    assert!(!output.status.success());
    assert!(stderr.contains("YYYY-MM-DD"));
}

#[test]
fn test_status_on_fresh_directory() {
    let home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();

    let (output, stdout, _) = run(archiver(&home).args([
        "status",
        "--save-dir",
        save_dir.path().to_str().unwrap(),
    ]));

    assert!(output.status.success());
    assert!(stdout.contains("No archive state found"));
    save_dir.child(".issue-archiver").assert(predicate::path::missing());
}

#[test]
fn test_status_lists_sync_records() {
    let home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();

    {
        let state = StateStore::open_for_save_dir(save_dir.path()).unwrap();
        state
            .record_sync(
                "https://api.github.com/",
                "acme/widgets",
                true,
                Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                12,
            )
            .unwrap();
    }

    let (output, stdout, _) = run(archiver(&home).args([
        "status",
        "--save-dir",
        save_dir.path().to_str().unwrap(),
    ]));

    assert!(output.status.success());
    assert!(stdout.contains("acme/widgets"));
    assert!(stdout.contains("2024-03-01 12:00:00 UTC"));
    assert!(stdout.contains("12 issues"));
}

#[test]
fn test_error_handling_invalid_config() {
    let home = TempDir::new().unwrap();
    let config = home.child("broken.yml");
    config.write_str("output: [this is not a mapping").unwrap();

    let (output, _, stderr) = run(archiver(&home).args([
        "--config",
        config.path().to_str().unwrap(),
        "status",
    ]));

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to parse config file"));
}

#[test]
fn test_config_file_option() {
    let home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();
    let config = home.child("config.yml");
    config
        .write_str(&format!(
            "output:\n  save_dir: \"{}\"\n",
            save_dir.path().display()
        ))
        .unwrap();

    let (output, stdout, _) = run(archiver(&home).args([
        "--config",
        config.path().to_str().unwrap(),
        "status",
    ]));

    assert!(output.status.success());
    assert!(stdout.contains(&save_dir.path().display().to_string()));
}
