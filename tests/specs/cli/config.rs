//! Configuration specs

use crate::prelude::*;

#[test]
fn config_prints_defaults_as_toml() {
    let ws = Workspace::empty();
    ws.dispatchctl()
        .args(&["config"])
        .passes()
        .stdout_has("[queue]")
        .stdout_has("concurrency_threshold = 4")
        .stdout_has("dispatch_interval = \"500ms\"")
        .stdout_has("filter = \"info\"");
}

#[test]
fn config_file_overrides_defaults() {
    let ws = Workspace::empty();
    ws.file(
        "config.toml",
        "[queue]\nconcurrency_threshold = 9\ncompleted_task_cache_life = \"1m\"\n",
    );
    let json = ws
        .dispatchctl()
        .arg("--config")
        .arg(ws.config_path())
        .args(&["--format", "json", "config"])
        .passes()
        .stdout_json();

    assert_eq!(json["queue"]["concurrency_threshold"], 9);
    assert_eq!(json["queue"]["completed_task_cache_life"], "1m");
    assert_eq!(json["queue"]["dispatch_interval"], "500ms");
}

#[test]
fn state_dir_flag_overrides_config() {
    let ws = Workspace::empty();
    ws.file("config.toml", "[storage]\nstate_dir = \"/nowhere\"\n");
    let json = ws
        .dispatchctl()
        .arg("--config")
        .arg(ws.config_path())
        .args(&["--format", "json", "config"])
        .passes()
        .stdout_json();

    assert_eq!(
        json["storage"]["state_dir"],
        ws.state_dir().display().to_string()
    );
}

// dirs honors XDG_CONFIG_HOME only on Linux
#[cfg(target_os = "linux")]
#[test]
fn default_config_is_read_from_config_dir() {
    let ws = Workspace::empty();
    ws.file("xdg/dispatch/config.toml", "[log]\nfilter = \"debug\"\n");
    ws.dispatchctl()
        .args(&["config"])
        .passes()
        .stdout_has("filter = \"debug\"");
}
