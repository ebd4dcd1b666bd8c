//! Black-box tests against the `rule-engine` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("rule-engine").unwrap();
    cmd.env("RULE_ENGINE_SIGNING_SECRET", "0123456789abcdef0123456789abcdef");
    cmd
}

#[test]
fn validate_accepts_well_formed_expression() {
    cmd()
        .args(["validate", r#"span.status == "ERROR""#])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn validate_rejects_malformed_expression() {
    cmd().args(["validate", "and and"]).assert().failure();
}

#[test]
fn ingest_reports_per_span_outcome() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"[{{"span_id":"s1","trace_id":"t1","parent_span_id":null,"operation_name":"op","service_name":"svc","status":"OK","kind":"INTERNAL","start":0,"end":1,"duration_ns":1,"attributes":{{}},"tenant_id":"tenant-a"}}]"#
    )
    .unwrap();

    cmd()
        .args(["ingest", "tenant-a", "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ingested 1/1"));
}

#[test]
fn import_reports_partial_success() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
rules:
  - id: ok-rule
    name: error-status
    severity: HIGH
    condition: span.status == "ERROR"
  - id: bad-rule
    name: broken
    condition: "and and"
"#
    )
    .unwrap();

    cmd()
        .args(["import", "tenant-a", "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 1/2"));
}

#[test]
fn query_returns_empty_json_array_for_unknown_tenant() {
    cmd()
        .args(["query", "tenant-nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn missing_signing_secret_fails_with_helpful_message() {
    let mut cmd = Command::cargo_bin("rule-engine").unwrap();
    cmd.env_remove("RULE_ENGINE_SIGNING_SECRET");
    cmd.args(["validate", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("signing secret"));
}
