//! End-to-end tests for the `logsvc` binary.
//!
//! Each test runs the real binary with an isolated data and config
//! directory, so nothing from the host environment leaks in.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use support::stub_loki::{cluster_config_json, StubLoki};
use tempfile::TempDir;

/// `logsvc` with every config lookup pointed into `home`.
fn logsvc(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("logsvc").expect("logsvc binary should exist");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env("LOGSERVICE_DATA_DIR", home.join("data"))
        .env("LOGSERVICE_CONFIG_DIR", home.join("config"))
        .env_remove("LOGSERVICE_CONFIG")
        .env_remove("LOGSERVICE_REDACTION")
        .env_remove("LOGSERVICE_REDACT")
        .env_remove("LOGSERVICE_MIN_INTERVAL")
        .env("LOGSVC_LOG", "off");
    cmd
}

fn write_config(home: &Path, base_url: &str) -> std::path::PathBuf {
    let path = home.join("cluster.json");
    std::fs::write(&path, cluster_config_json(base_url)).unwrap();
    path
}

// ============================================================================
// Argument errors
// ============================================================================

#[test]
fn unknown_subcommand_exits_with_args_error() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .arg("nonexistent-command")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn query_without_cluster_id_is_args_error() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .args(["query", "--keyword", "error"])
        .assert()
        .code(10);
}

#[test]
fn bad_timestamp_is_args_error() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .args(["query", "--cluster-id", "c1", "--start", "yesterday"])
        .assert()
        .code(10);
}

#[test]
fn huge_since_is_rejected_before_any_lookup() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .args(["query", "--cluster-id", "c1", "--since", "18446744073709551615"])
        .assert()
        .code(11)
        .stdout(predicate::str::contains("out of range"));
}

#[test]
fn help_exits_clean() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query"));
}

// ============================================================================
// redact
// ============================================================================

#[test]
fn redact_filters_stdin() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .arg("redact")
        .write_stdin("login ok\npassword=hunter2\nAuthorization: Bearer abc.def.ghi\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("login ok"))
        .stdout(predicate::str::contains("password=***"))
        .stdout(predicate::str::contains("hunter2").not())
        .stdout(predicate::str::contains("abc.def.ghi").not());
}

#[test]
fn redact_uses_custom_rules() {
    let home = TempDir::new().unwrap();
    let rules = home.path().join("rules.json");
    std::fs::write(
        &rules,
        r#"{"patterns":[{"pattern":"user=\\w+","replace":"user=<hidden>"}]}"#,
    )
    .unwrap();
    logsvc(home.path())
        .args(["redact", "--rules"])
        .arg(&rules)
        .write_stdin("user=alice password=hunter2\n")
        .assert()
        .success()
        .stdout("user=<hidden> password=hunter2\n");
}

// ============================================================================
// check
// ============================================================================

#[test]
fn check_accepts_valid_config() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "http://loki:3100");
    logsvc(home.path())
        .args(["check", "--cluster-config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "ok""#))
        .stdout(predicate::str::contains("redaction_rules"));
}

#[test]
fn check_rejects_missing_labels() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("cluster.json");
    std::fs::write(&config, r#"{"loki":{"base_url":"http://loki:3100"}}"#).unwrap();
    logsvc(home.path())
        .args(["check", "--cluster-config"])
        .arg(&config)
        .assert()
        .code(11)
        .stdout(predicate::str::contains(r#""status": "error""#));
}

#[test]
fn check_without_any_config_fails() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .args(["check", "-f", "text"])
        .assert()
        .code(11)
        .stdout(predicate::str::contains("cluster_config: error"));
}

// ============================================================================
// query
// ============================================================================

#[test]
fn query_prints_redacted_text_lines() {
    let home = TempDir::new().unwrap();
    let stub = StubLoki::generating(5);
    let config = write_config(home.path(), &stub.base_url());

    let output = logsvc(home.path())
        .args([
            "query",
            "--cluster-id",
            "c1",
            "--start",
            "2024-05-01T10:00:00Z",
            "--end",
            "2024-05-01T10:05:00Z",
            "--max-lines",
            "2",
            "-f",
            "text",
            "--cluster-config",
        ])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.ends_with("token=***")), "{}", stdout);
    assert_eq!(stub.requests().len(), 1);
}

#[test]
fn query_with_missing_config_reports_structured_error() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .args(["query", "--cluster-id", "c1", "--cluster-config"])
        .arg(home.path().join("absent.json"))
        .assert()
        .code(11)
        .stdout(predicate::str::contains(r#""code": 12"#));
}

#[test]
fn query_upstream_failure_exits_20() {
    let home = TempDir::new().unwrap();
    let stub = StubLoki::fixed(503, "unavailable");
    let config = write_config(home.path(), &stub.base_url());
    logsvc(home.path())
        .args(["query", "--cluster-id", "c1", "--since", "600", "--cluster-config"])
        .arg(&config)
        .assert()
        .code(20);
}

// ============================================================================
// export
// ============================================================================

#[test]
fn export_writes_file_under_data_dir() {
    let home = TempDir::new().unwrap();
    let output = logsvc(home.path())
        .args(["export", "--export-format", "markdown", "-f", "text"])
        .write_stdin(r#"[{"ts":"1","line":"password=hunter2"}]"#)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let path = String::from_utf8(output).unwrap().trim().to_string();
    assert!(Path::new(&path).starts_with(home.path().join("data").join("exports")));
    assert!(path.ends_with(".markdown"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "```\n1 password=***\n```\n"
    );
}

#[test]
fn export_rejects_malformed_input() {
    let home = TempDir::new().unwrap();
    logsvc(home.path())
        .arg("export")
        .write_stdin("not json")
        .assert()
        .code(10);
}
