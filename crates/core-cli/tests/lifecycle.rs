mod common;

use common::TestFixture;
use predicates::prelude::*;

#[test]
fn init_creates_the_data_directory() {
    let fixture = TestFixture::new();
    let body = fixture.json(&["init"]);
    assert!(body["data_dir"].as_str().unwrap().ends_with(".port"));

    fixture
        .command()
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized").and(predicate::str::contains(".port")));
}

#[test]
fn unknown_port_id_reports_not_found_on_stderr() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    fixture
        .command()
        .args(["port", "show", "port-does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not_found").or(predicate::str::contains("not found")));
}

#[test]
fn session_hierarchy_tracks_depth_and_root() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let s1 = fixture.json(&["session", "start", "--title", "root build"]);
    let s1_id = s1["id"].as_str().unwrap();
    assert_eq!(s1["depth"], 0);
    assert_eq!(s1["root_id"], s1_id);

    let s2 = fixture.json(&[
        "session",
        "start",
        "--title",
        "operator",
        "--session-type",
        "operator",
        "--parent-id",
        s1_id,
    ]);
    assert_eq!(s2["depth"], 1);
    assert_eq!(s2["root_id"], s1_id);

    let s3 = fixture.json(&[
        "session",
        "start",
        "--title",
        "worker",
        "--session-type",
        "worker",
        "--parent-id",
        s2["id"].as_str().unwrap(),
    ]);
    assert_eq!(s3["depth"], 2);
    assert_eq!(s3["root_id"], s1_id);

    fixture.command().args(["session", "end", s3["id"].as_str().unwrap()]).assert().success();

    let tree = fixture.json(&["session", "tree", s1_id]);
    let ended = tree.as_array().unwrap().iter().find(|s| s["id"] == s3["id"]).unwrap();
    assert_eq!(ended["status"], "complete");
    assert!(!ended["ended_at"].is_null());
}

#[test]
fn port_transition_to_running_fails_under_a_held_lock() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let session = fixture.json(&["session", "start", "--title", "worker"]);
    let session_id = session["id"].as_str().unwrap();
    let other = fixture.json(&["session", "start", "--title", "other worker"]);
    let other_id = other["id"].as_str().unwrap();

    let port = fixture.json(&["port", "create", "--title", "write the parser"]);
    let port_id = port["id"].as_str().unwrap();
    let resource = format!("port:{port_id}");

    fixture.command().args(["lock", "acquire", &resource, other_id]).assert().success();

    fixture
        .command()
        .args(["port", "status", port_id, "running", "--session-id", session_id])
        .assert()
        .failure();

    let unchanged = fixture.json(&["port", "show", port_id]);
    assert_eq!(unchanged["status"], "pending");

    fixture.command().args(["lock", "release", &resource, other_id]).assert().success();

    fixture
        .command()
        .args(["port", "status", port_id, "running", "--session-id", session_id])
        .assert()
        .success();
}

#[test]
fn startup_sweep_releases_locks_held_by_non_running_sessions() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let session = fixture.json(&["session", "start", "--title", "crashed worker"]);
    let session_id = session["id"].as_str().unwrap();

    fixture.command().args(["lock", "acquire", "shared-file", session_id]).assert().success();
    fixture
        .command()
        .args(["session", "end", session_id, "--status", "failed"])
        .assert()
        .success();

    // Any subsequent command runs the startup sweep before dispatching.
    let locks = fixture.json(&["lock", "list"]);
    assert!(locks.as_array().unwrap().is_empty());
}

#[test]
fn message_fan_in_is_ordered_and_consumed_once() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let operator = fixture.json(&["session", "start", "--title", "operator", "--session-type", "operator"]);
    let operator_id = operator["id"].as_str().unwrap();
    let worker_a = fixture.json(&["session", "start", "--title", "worker a", "--session-type", "worker"]);
    let worker_b = fixture.json(&["session", "start", "--title", "worker b", "--session-type", "worker"]);

    for (worker, text) in [(worker_a, "a done"), (worker_b, "b done")] {
        fixture.json(&[
            "message",
            "send",
            "--conversation-id",
            "conv-1",
            "--from",
            worker["id"].as_str().unwrap(),
            "--to",
            operator_id,
            "--subtype",
            "test_pass",
            "--payload",
            &format!("{{\"note\":\"{text}\"}}"),
        ]);
    }

    let received = fixture.json(&["message", "receive", operator_id]);
    let received = received.as_array().unwrap();
    assert_eq!(received.len(), 2);

    for message in received {
        fixture.command().args(["message", "mark-processed", message["id"].as_str().unwrap()]).assert().success();
    }

    let empty = fixture.json(&["message", "receive", operator_id]);
    assert!(empty.as_array().unwrap().is_empty(), "processed messages must not be redelivered");
}

#[test]
fn compaction_resets_tokens_and_recovery_prompt_surfaces_the_checkpoint() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let session = fixture.json(&["session", "start", "--title", "long worker", "--token-budget", "1000"]);
    let session_id = session["id"].as_str().unwrap();

    fixture.json(&[
        "checkpoint",
        "create",
        session_id,
        "--summary",
        "approaching the context window limit",
        "--active-files",
        "src/a.rs,src/b.rs",
    ]);

    let compacted = fixture.json(&[
        "session",
        "compact",
        session_id,
        "--trigger",
        "token_limit",
        "--after-tokens",
        "200",
        "--preserved",
        "current_task,decisions",
    ]);
    assert_eq!(compacted["status"], "compacted");
    assert_eq!(compacted["tokens_used"], 200);

    let prompt = fixture.json(&["checkpoint", "recovery-prompt", session_id]);
    let prompt = prompt["prompt"].as_str().unwrap();
    assert!(prompt.contains("approaching the context window limit"));
    assert!(prompt.contains("src/a.rs"));
}

#[test]
fn port_end_takes_a_mandatory_checkpoint() {
    let fixture = TestFixture::new();
    fixture.json(&["init"]);

    let session = fixture.json(&["session", "start", "--title", "worker"]);
    let session_id = session["id"].as_str().unwrap();
    let port = fixture.json(&["port", "create", "--title", "implement the parser"]);
    let port_id = port["id"].as_str().unwrap();

    fixture
        .command()
        .args(["port", "status", port_id, "running", "--session-id", session_id])
        .assert()
        .success();
    fixture.command().args(["port", "status", port_id, "complete"]).assert().success();

    let prompt = fixture.json(&["checkpoint", "recovery-prompt", session_id]);
    let prompt = prompt["prompt"].as_str().unwrap();
    assert!(prompt.contains("implement the parser"));
    assert!(prompt.contains("ended"));
}
