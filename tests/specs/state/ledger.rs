//! Resource ledger specs

use crate::prelude::*;

#[test]
fn ledger_list_on_fresh_state_is_empty() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["ledger", "list"])
        .passes()
        .stdout_eq("No resources held\n");
}

#[test]
fn ledger_list_leaves_missing_state_dir_alone() {
    let ws = Workspace::empty();
    ws.dispatchctl().args(&["ledger", "list"]).passes();
    assert!(!ws.state_dir().exists());
}

#[test]
fn ledger_list_reads_a_store_held_by_a_coordinator() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update);

    ws.with_store(|_held| {
        ws.dispatchctl()
            .args(&["ledger", "list"])
            .passes()
            .stdout_eq("t-1\trepository:zoo\tupdate\n");
    });
}

#[test]
fn ledger_clear_refuses_a_held_store() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update);

    ws.with_store(|_held| {
        ws.dispatchctl()
            .args(&["ledger", "clear"])
            .fails()
            .stderr_has("locked by another process");
    });
    assert_eq!(ws.ledger_rows(), 1);
}

#[test]
fn ledger_list_shows_held_resources() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update)
        .holds("t-2", "pets", Operation::Read);

    ws.dispatchctl()
        .args(&["ledger", "list"])
        .passes()
        .stdout_eq("t-1\trepository:zoo\tupdate\nt-2\trepository:pets\tread\n");
}

#[test]
fn ledger_list_json() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Delete);

    let json = ws
        .dispatchctl()
        .args(&["--format", "json", "ledger", "list"])
        .passes()
        .stdout_json();
    assert_eq!(
        json,
        serde_json::json!([
            {"task_id": "t-1", "resource": "repository:zoo", "operations": ["delete"]}
        ])
    );
}

#[test]
fn ledger_clear_drops_every_row() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update)
        .holds("t-2", "pets", Operation::Read);

    ws.dispatchctl()
        .args(&["ledger", "clear"])
        .passes()
        .stdout_has("Removed 2 ledger row(s)");
    assert_eq!(ws.ledger_rows(), 0);
}

#[test]
fn compact_preserves_rows() {
    let ws = Workspace::empty();
    ws.holds("t-1", "zoo", Operation::Update)
        .holds("t-2", "pets", Operation::Read)
        .with_store(|store| {
            use dispatch_storage::LedgerStore;
            store.remove(&"t-2".into()).unwrap();
        });

    ws.dispatchctl()
        .args(&["compact"])
        .passes()
        .stdout_has("Compacted 3 record(s) to 1");
    assert_eq!(ws.ledger_rows(), 1);
}
