use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("sca-engine").unwrap()
}

fn write_policy(dir: &std::path::Path, cfg_path: &std::path::Path) -> std::path::PathBuf {
    std::fs::write(cfg_path, "EnableFoo=1\n").unwrap();
    let policy_path = dir.join("policy.toml");
    let contents = format!(
        r#"
policy_id = "example"
name = "Example policy"

[[checks]]
id = 1
title = "foo is enabled"
condition = "all"
rules = ["f:{} -> r:^EnableFoo=1$"]
"#,
        cfg_path.display()
    );
    std::fs::write(&policy_path, contents).unwrap();
    policy_path
}

#[test]
fn validate_accepts_a_well_formed_policy() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("a.cfg");
    let policy_path = write_policy(dir.path(), &cfg_path);

    cmd()
        .arg("validate")
        .arg(&policy_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("example: 1 checks, ok"));
}

#[test]
fn validate_rejects_a_malformed_policy() {
    let dir = tempfile::tempdir().unwrap();
    let policy_path = dir.path().join("bad.toml");
    std::fs::write(&policy_path, "not valid toml [[[").unwrap();

    cmd().arg("validate").arg(&policy_path).assert().code(2);
}

#[test]
fn validate_rejects_a_missing_path() {
    cmd().arg("validate").arg("/nonexistent/policy.toml").assert().code(2);
}

#[test]
fn scan_emits_a_check_a_summary_and_a_policies_event() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("a.cfg");
    let policy_path = write_policy(dir.path(), &cfg_path);

    let output = cmd().arg("scan").arg(&policy_path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();

    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.iter().any(|l| l.contains("\"type\":\"check\"")));
    assert!(lines.iter().any(|l| l.contains("\"scan_id\"")));
    assert!(lines.iter().any(|l| l.contains("\"type\":\"policies\"")));

    let check_line = lines.iter().find(|l| l.contains("\"type\":\"check\"")).unwrap();
    let check: serde_json::Value = serde_json::from_str(check_line).unwrap();
    assert_eq!(check["check"]["result"], "passed");
}

#[test]
fn scan_requires_at_least_one_policy() {
    cmd().arg("scan").assert().code(2);
}
