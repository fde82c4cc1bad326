//! CLI error specs

use crate::prelude::*;

#[test]
fn unknown_subcommand_fails() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["frobnicate"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn check_requires_a_resource() {
    let ws = Workspace::empty();
    ws.dispatchctl().args(&["check"]).fails();
}

#[test]
fn check_rejects_unknown_resource_type() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["check", "planet:mars=read"])
        .fails()
        .stderr_has("unknown resource type: planet");
}

#[test]
fn check_rejects_unknown_operation() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["check", "repository:zoo=frob"])
        .fails()
        .stderr_has("unknown operation: frob");
}

#[test]
fn invalid_config_file_fails() {
    let ws = Workspace::empty();
    ws.file("config.toml", "[queue]\nconcurrency_threshold = \"many\"\n");
    ws.dispatchctl()
        .arg("--config")
        .arg(ws.config_path())
        .args(&["matrix"])
        .fails()
        .stderr_has("failed to load config");
}

#[test]
fn missing_explicit_config_fails() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .arg("--config")
        .arg(ws.path().join("absent.toml"))
        .args(&["matrix"])
        .fails()
        .stderr_has("absent.toml");
}
