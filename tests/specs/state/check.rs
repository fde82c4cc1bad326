//! Dry-run admission specs

use crate::prelude::*;

#[test]
fn check_accepts_against_empty_ledger() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["check", "repository:zoo=create"])
        .passes()
        .stdout_eq("accepted\n");
}

#[test]
fn check_reads_a_store_held_by_a_coordinator() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Delete);

    ws.with_store(|_held| {
        ws.dispatchctl()
            .args(&["check", "repository:zoo=read"])
            .exits_with(3)
            .stdout_has("repository:zoo held for delete by t-1");
    });
}

#[test]
fn check_postponed_exits_two() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Read);

    ws.dispatchctl()
        .args(&["check", "repository:zoo=update"])
        .exits_with(2)
        .stdout_eq("postponed\n  repository:zoo held for read by t-1\n");
}

#[test]
fn check_rejected_exits_three() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Delete)
        .holds("t-2", "pets", Operation::Update);

    ws.dispatchctl()
        .args(&["check", "repository:zoo=read", "repository:pets=update"])
        .exits_with(3)
        .stdout_has("rejected")
        .stdout_has("repository:zoo held for delete by t-1")
        .stdout_lacks("t-2");
}

#[test]
fn check_concurrent_reads_are_accepted() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update);

    ws.dispatchctl()
        .args(&["check", "repository:zoo=read"])
        .passes();
}

#[test]
fn check_does_not_claim_resources() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["check", "repository:zoo=create"])
        .passes();
    assert_eq!(ws.ledger_rows(), 0);
}

#[test]
fn check_json_lists_blocking_tasks() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Create);

    let json = ws
        .dispatchctl()
        .args(&["--format", "json", "check", "repository:zoo=delete"])
        .exits_with(2)
        .stdout_json();
    assert_eq!(json["response"], "postponed");
    assert_eq!(json["blocking"], serde_json::json!(["t-1"]));
    assert_eq!(json["reasons"][0]["operation"], "create");
}
