//! Journaled call specs

use crate::prelude::*;

#[test]
fn calls_list_on_fresh_state_is_empty() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["calls", "list"])
        .passes()
        .stdout_eq("No journaled calls\n");
    assert!(!ws.state_dir().exists());
}

#[test]
fn calls_list_in_queue_order() {
    let ws = Workspace::empty();
    ws.journaled("t-2", 30, CallRequest::new("repo.publish").with_arg("zoo"))
        .journaled("t-1", 10, CallRequest::new("repo.sync").with_arg("zoo"));

    ws.dispatchctl()
        .args(&["calls", "list"])
        .passes()
        .stdout_eq(
            "t-1\t2026-01-01 12:10:00\tCallRequest: repo.sync(\"zoo\")\n\
             t-2\t2026-01-01 12:30:00\tCallRequest: repo.publish(\"zoo\")\n",
        );
}

#[test]
fn calls_list_filters_by_task_type() {
    let ws = Workspace::empty();
    ws.journaled("t-1", 10, CallRequest::new("repo.sync"))
        .journaled("t-2", 20, CallRequest::new("repo.publish"));

    ws.dispatchctl()
        .args(&["calls", "list", "--task-type", "repo.publish"])
        .passes()
        .stdout_has("t-2")
        .stdout_lacks("t-1");
}

#[test]
fn calls_list_json_carries_request_identity() {
    let ws = Workspace::empty();
    let request = CallRequest::new("repo.sync").with_tag("nightly");
    let request_id = request.id.clone();
    ws.journaled("t-1", 10, request);

    let json = ws
        .dispatchctl()
        .args(&["--format", "json", "calls", "list"])
        .passes()
        .stdout_json();
    assert_eq!(json[0]["task_id"], "t-1");
    assert_eq!(json[0]["call_request_id"], request_id.as_str());
    assert_eq!(json[0]["task_type"], "repo.sync");
    assert_eq!(json[0]["tags"], serde_json::json!(["nightly"]));
}
