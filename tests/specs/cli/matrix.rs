//! Compatibility matrix specs

use crate::prelude::*;

#[test]
fn matrix_prints_table() {
    let ws = Workspace::empty();
    ws.dispatchctl().args(&["matrix"]).passes().stdout_eq(
        "\
held\\new  create    read      update    delete
create    reject    postpone  postpone  postpone
read      postpone  none      postpone  postpone
update    postpone  none      postpone  postpone
delete    postpone  reject    reject    reject
",
    );
}

#[test]
fn matrix_json_lists_sixteen_cells() {
    let ws = Workspace::empty();
    let json = ws
        .dispatchctl()
        .args(&["--format", "json", "matrix"])
        .passes()
        .stdout_json();

    let cells = json.as_array().unwrap();
    assert_eq!(cells.len(), 16);
    assert_eq!(cells[5]["held"], "read");
    assert_eq!(cells[5]["proposed"], "read");
    assert_eq!(cells[5]["conflict"], "none");
}
