//! Binary smoke tests for the `fsq` CLI.
//!
//! These run the compiled binary with `assert_cmd` against tempdir queues:
//! each subcommand must build, parse, and leave the queue directory in the
//! state an operator would expect.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn fsq() -> Command {
    let mut cmd = Command::cargo_bin("fsq").unwrap();
    cmd.timeout(Duration::from_secs(30));
    cmd
}

// ── Binary builds and responds ──────────────────────────────────────────────

#[test]
fn version_flag() {
    fsq()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("fsq "));
}

#[test]
fn help_lists_subcommands() {
    let output = fsq().arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    for cmd in &[
        "submit", "worker", "init", "status", "show", "pause", "resume", "cancel", "retry",
    ] {
        assert!(stdout.contains(cmd), "help should mention '{cmd}'");
    }
}

// ── Init ────────────────────────────────────────────────────────────────────

#[test]
fn init_creates_state_directories() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();

    for sub in &["queued", "checking", "active", "paused", "done", "failed"] {
        assert!(dir.path().join(sub).is_dir(), "init should create {sub}/");
    }
}

// ── Submit ──────────────────────────────────────────────────────────────────

#[test]
fn submit_prints_the_completion_witness() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args(["submit", &dir.path().to_string_lossy(), "echo hi"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("test -f '"))
        .stdout(predicate::str::contains("/done/task_"));
}

#[test]
fn submit_writes_one_task_file_into_queued() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args(["submit", &dir.path().to_string_lossy(), "echo hi"])
        .assert()
        .success();

    let entries: Vec<_> = fs::read_dir(dir.path().join("queued")).unwrap().flatten().collect();
    assert_eq!(entries.len(), 1);
    let content = fs::read_to_string(entries[0].path()).unwrap();
    assert_eq!(content, "true\n---\necho hi");
}

#[test]
fn submit_honors_chk_flag() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args([
            "submit",
            &dir.path().to_string_lossy(),
            "echo hi",
            "--chk",
            "test -f /tmp/gate",
        ])
        .assert()
        .success();

    let entries: Vec<_> = fs::read_dir(dir.path().join("queued")).unwrap().flatten().collect();
    let content = fs::read_to_string(entries[0].path()).unwrap();
    assert!(content.starts_with("test -f /tmp/gate\n---\n"));
}

// ── Worker ──────────────────────────────────────────────────────────────────

#[test]
fn worker_on_empty_queue_exits_zero() {
    let dir = TempDir::new().unwrap();
    fsq().arg("worker").arg(dir.path()).assert().success();
}

#[test]
fn worker_drains_the_queue_and_records_output() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args(["submit", &dir.path().to_string_lossy(), "echo from-cli"])
        .assert()
        .success();

    fsq().arg("worker").arg(dir.path()).assert().success();

    let done: Vec<_> = fs::read_dir(dir.path().join("done")).unwrap().flatten().collect();
    assert_eq!(done.len(), 1);
    let content = fs::read_to_string(done[0].path()).unwrap();
    assert!(content.contains("=== worker_"));
    assert!(content.ends_with("from-cli\n"));
}

#[test]
fn worker_routes_failures_to_failed() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args(["submit", &dir.path().to_string_lossy(), "exit 7"])
        .assert()
        .success();

    fsq().arg("worker").arg(dir.path()).assert().success();

    let failed: Vec<_> = fs::read_dir(dir.path().join("failed")).unwrap().flatten().collect();
    assert_eq!(failed.len(), 1);
}

// ── Status / show ───────────────────────────────────────────────────────────

#[test]
fn status_lists_tasks_by_state() {
    let dir = TempDir::new().unwrap();
    fsq()
        .args(["submit", &dir.path().to_string_lossy(), "echo hi"])
        .assert()
        .success();

    fsq()
        .arg("status")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("queued (1):"))
        .stdout(predicate::str::contains("task_"));
}

#[test]
fn status_json_is_parseable() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();

    let output = fsq()
        .args(["status", &dir.path().to_string_lossy(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["states"].as_array().unwrap().len(), 6);
}

#[test]
fn show_prints_task_content_and_state() {
    let dir = TempDir::new().unwrap();
    let output = fsq()
        .args(["submit", &dir.path().to_string_lossy(), "echo hi"])
        .output()
        .unwrap();
    let witness = String::from_utf8_lossy(&output.stdout);
    // Recover the id from the witness path.
    let task_id = witness.rsplit('/').next().unwrap().trim().trim_end_matches('\'');

    fsq()
        .args(["show", &dir.path().to_string_lossy(), task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("State: queued"))
        .stdout(predicate::str::contains("echo hi"));
}

#[test]
fn show_unknown_task_fails() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();

    fsq()
        .args(["show", &dir.path().to_string_lossy(), "task_nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ── Operator actions ────────────────────────────────────────────────────────

#[test]
fn pause_requires_an_active_task() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();

    fsq()
        .args(["pause", &dir.path().to_string_lossy(), "task_nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in active/"));
}

#[test]
fn retry_moves_failed_back_to_queued() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();
    let task_id = "task_20240101_000000_000000003";
    fs::write(
        dir.path().join("failed").join(task_id),
        "true\n---\nexit 1\n=== worker_x ===\n",
    )
    .unwrap();

    fsq()
        .args(["retry", &dir.path().to_string_lossy(), task_id])
        .assert()
        .success();

    assert!(dir.path().join("queued").join(task_id).exists());
    assert!(!dir.path().join("failed").join(task_id).exists());
}

#[test]
fn cancel_removes_a_paused_task() {
    let dir = TempDir::new().unwrap();
    fsq().arg("init").arg(dir.path()).assert().success();
    let task_id = "task_20240101_000000_000000004";
    fs::write(dir.path().join("paused").join(task_id), "true\n---\nsleep 9").unwrap();

    fsq()
        .args(["cancel", &dir.path().to_string_lossy(), task_id])
        .assert()
        .success();

    assert!(!dir.path().join("paused").join(task_id).exists());
}
