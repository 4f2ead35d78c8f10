//! End-to-end tests for general CLI behaviour: help, version, configuration
//! discovery and completions.

mod common;

use common::prelude::*;

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("docmesh");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("navigation"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("docmesh");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config_fails_with_hint() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .args(["navigation", "validate"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_invalid_config_fails() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);
    fixture
        .command()
        .args(["navigation", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("docmesh");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docmesh"));
}
