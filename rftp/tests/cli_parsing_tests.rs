//! CLI argument parsing tests for rftp
//!
//! These verify that command-line arguments are parsed correctly and that
//! configuration errors are reported before anything touches the network.

use assert_cmd::Command;

#[test]
fn test_help_runs() {
    Command::cargo_bin("rftp")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_version_runs() {
    Command::cargo_bin("rftp")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_missing_required_arguments_fail() {
    Command::cargo_bin("rftp")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicates::str::contains("--server"));
}

#[test]
fn test_boolean_flags_parse() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args(["--clean", "--overwrite", "--flatten", "--progress", "--help"])
        .assert()
        .success();
}

#[test]
fn test_quiet_short_flag() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args(["-q", "--help"])
        .assert()
        .success();
}

#[test]
fn test_verbose_triple() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args(["-vvv", "--help"])
        .assert()
        .success();
}

#[test]
fn test_repeated_patterns_parse() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args(["-p", "*.html", "--pattern", "assets/**", "--help"])
        .assert()
        .success();
}

#[test]
fn test_max_workers_numeric() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args(["--max-workers", "4", "--help"])
        .assert()
        .success();
}

#[test]
fn test_unsupported_scheme_is_rejected() {
    Command::cargo_bin("rftp")
        .unwrap()
        .args([
            "--server",
            "http://example.com",
            "--user",
            "deploy",
            "--password",
            "secret",
            "--remote-path",
            "/site",
            ".",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unsupported server url"));
}

#[test]
fn test_missing_root_folder_fails_without_connecting() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let missing = tmp_dir.path().join("no-such-folder");
    Command::cargo_bin("rftp")
        .unwrap()
        .args([
            "--server",
            "ftp://ftp.example.com",
            "--user",
            "deploy",
            "--password",
            "secret",
            "--remote-path",
            "/site",
            missing.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("does not exist"));
}
