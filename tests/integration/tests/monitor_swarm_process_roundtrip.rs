//! End-to-end monitor cycles against a mocked tracker API with the real
//! process backend: poll, classify, spawn the swarm command, and verify the
//! label and comment transitions plus the persisted state file.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;

use hive_github::label_policy::LabelPolicy;
use hive_monitor::{run_issue_monitor, IssueMonitorConfig};
use hive_swarm::{ProcessSwarmBackend, RosterTable};

fn write_executable_script(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write script");
    let status = std::process::Command::new("chmod")
        .arg("+x")
        .arg(path)
        .status()
        .expect("chmod script");
    assert!(status.success());
}

fn one_shot_config(
    base_url: &str,
    state_dir: &Path,
    bot_login: Option<&str>,
    backend: Arc<ProcessSwarmBackend>,
) -> IssueMonitorConfig {
    IssueMonitorConfig {
        backend,
        repo_slug: "owner/repo".to_string(),
        api_base: base_url.to_string(),
        token: "test-token".to_string(),
        bot_login: bot_login.map(str::to_string),
        state_dir: state_dir.to_path_buf(),
        poll_interval: Duration::from_millis(1),
        poll_once: true,
        error_cooldown: Duration::from_millis(1),
        max_inflight_dispatches: 2,
        dispatch_timeout: Duration::from_secs(10),
        auto_close_grace: Duration::from_millis(20),
        processed_version_cap: 64,
        label_policy: LabelPolicy::default(),
        roster: RosterTable::default(),
        request_timeout_ms: 3_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 5,
    }
}

fn issue_row(number: u64, title: &str, body: &str, updated_at: &str) -> Value {
    json!({
        "id": number,
        "number": number,
        "title": title,
        "body": body,
        "state": "open",
        "created_at": "2026-02-01T09:00:00Z",
        "updated_at": updated_at,
        "user": {"login": "alice"},
        "labels": [],
    })
}

fn saved_state(state_dir: &Path) -> Value {
    let raw = std::fs::read_to_string(state_dir.join("owner__repo").join("state.json"))
        .expect("state file");
    serde_json::from_str(&raw).expect("state json")
}

#[tokio::test]
async fn integration_one_shot_cycle_runs_process_and_marks_processed() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("swarm.sh");
    write_executable_script(&script, "#!/bin/sh\necho 'analysis transcript line'\nexit 0\n");
    let spool = dir.path().join("spool");
    let state_dir = dir.path().join("state");

    let server = MockServer::start();
    let viewer = server.mock(|when, then| {
        when.method(GET).path("/user");
        then.status(200).json_body(json!({"login": "hive-bot"}));
    });
    let list = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues");
        then.status(200)
            .header("etag", "W/\"issues-t1\"")
            .json_body(json!([issue_row(
                41,
                "Implement retry backoff caps",
                "Clamp the fetch retry delay before the next poll window.",
                "2026-02-01T10:00:00Z",
            )]));
    });
    let comments = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/41/comments");
        then.status(200).json_body(json!([]));
    });
    let in_progress_add = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/41/labels")
            .body_includes("in-progress");
        then.status(200).json_body(json!([]));
    });
    let processed_add = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/41/labels")
            .body_includes("processed");
        then.status(200).json_body(json!([]));
    });
    let in_progress_remove = server.mock(|when, then| {
        when.method(DELETE)
            .path("/repos/owner/repo/issues/41/labels/in-progress");
        then.status(200).json_body(json!([]));
    });
    let dispatch_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/41/comments")
            .body_includes("Swarm analysis started")
            .body_includes("41:2026-02-01T10:00:00Z")
            .body_includes("implementer,reviewer,tester");
        then.status(201).json_body(json!({"id": 9001}));
    });
    let completion_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/41/comments")
            .body_includes("Swarm analysis completed.");
        then.status(201).json_body(json!({"id": 9002}));
    });

    let backend = Arc::new(ProcessSwarmBackend::new(
        script.to_string_lossy().into_owned(),
        Vec::new(),
        spool.clone(),
    ));
    let config = one_shot_config(&server.base_url(), &state_dir, None, backend);
    run_issue_monitor(config).await.expect("monitor run");

    viewer.assert_calls(1);
    list.assert_calls(1);
    comments.assert_calls(1);
    in_progress_add.assert_calls(1);
    processed_add.assert_calls(1);
    in_progress_remove.assert_calls(1);
    dispatch_comment.assert_calls(1);
    completion_comment.assert_calls(1);

    let state = saved_state(&state_dir);
    assert_eq!(state["schema_version"], 1);
    assert_eq!(state["list_etag"], "W/\"issues-t1\"");
    assert!(state["last_checked_at"].is_string());
    let records = state["processed_versions"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["issue_number"], 41);
    assert_eq!(records[0]["issue_updated_at"], "2026-02-01T10:00:00Z");
    assert_eq!(records[0]["phase"], "implementation");
    assert_eq!(records[0]["outcome"], "processed");

    let run_dirs: Vec<_> = std::fs::read_dir(&spool)
        .expect("spool dir")
        .collect::<Result<_, _>>()
        .expect("spool entries");
    assert_eq!(run_dirs.len(), 1);
    let run_dir = run_dirs[0].path();
    assert!(run_dirs[0]
        .file_name()
        .to_string_lossy()
        .starts_with("hive-41-"));
    let task = std::fs::read_to_string(run_dir.join("task.md")).expect("task file");
    assert!(task.contains("Implement retry backoff caps"));
    let stdout_log = std::fs::read_to_string(run_dir.join("stdout.log")).expect("stdout log");
    assert!(stdout_log.contains("analysis transcript line"));
}

#[tokio::test]
async fn integration_process_failure_routes_error_transition() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("swarm.sh");
    write_executable_script(
        &script,
        "#!/bin/sh\necho 'roster worker exploded' >&2\nexit 3\n",
    );
    let spool = dir.path().join("spool");
    let state_dir = dir.path().join("state");

    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues");
        then.status(200).json_body(json!([issue_row(
            52,
            "Research flaky fetch behavior",
            "Collect evidence before changing the retry policy.",
            "2026-02-02T08:30:00Z",
        )]));
    });
    let comments = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/52/comments");
        then.status(200).json_body(json!([]));
    });
    let in_progress_add = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/52/labels")
            .body_includes("in-progress");
        then.status(200).json_body(json!([]));
    });
    let error_add = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/52/labels")
            .body_includes("error");
        then.status(200).json_body(json!([]));
    });
    let in_progress_remove = server.mock(|when, then| {
        when.method(DELETE)
            .path("/repos/owner/repo/issues/52/labels/in-progress");
        then.status(200).json_body(json!([]));
    });
    let dispatch_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/52/comments")
            .body_includes("Swarm analysis started");
        then.status(201).json_body(json!({"id": 9101}));
    });
    let error_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/52/comments")
            .body_includes("Swarm analysis failed.")
            .body_includes("exit status 3: roster worker exploded")
            .body_includes("dispatch_failed");
        then.status(201).json_body(json!({"id": 9102}));
    });

    let backend = Arc::new(ProcessSwarmBackend::new(
        script.to_string_lossy().into_owned(),
        Vec::new(),
        spool,
    ));
    let config = one_shot_config(&server.base_url(), &state_dir, Some("hive"), backend);
    run_issue_monitor(config).await.expect("monitor run");

    list.assert_calls(1);
    comments.assert_calls(1);
    in_progress_add.assert_calls(1);
    error_add.assert_calls(1);
    in_progress_remove.assert_calls(1);
    dispatch_comment.assert_calls(1);
    error_comment.assert_calls(1);

    let state = saved_state(&state_dir);
    let records = state["processed_versions"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["issue_number"], 52);
    assert_eq!(records[0]["phase"], "research");
    assert_eq!(records[0]["outcome"], "error");
}
