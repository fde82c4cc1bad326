//! Shared helpers for CLI specs

use assert_cmd::Command;
use chrono::{TimeZone, Utc};
pub use dispatch_core::{CallRequest, Operation};
use dispatch_core::{ResourceType, TaskId};
use dispatch_storage::{CallJournal, LedgerStore, QueuedCall, TaskResource, WalStore};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch config file and state directory
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.path().join("state")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    /// Write a file relative to the workspace root
    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
        self
    }

    /// Open the store, run `f`, and release the file lock
    pub fn with_store(&self, f: impl FnOnce(&WalStore)) -> &Self {
        std::fs::create_dir_all(self.state_dir()).unwrap();
        let store = WalStore::open(&self.state_dir().join("ledger.wal")).unwrap();
        f(&store);
        self
    }

    /// Record that `task` holds `op` on `repository:<repo>`
    pub fn holds(&self, task: &str, repo: &str, op: Operation) -> &Self {
        self.with_store(|store| {
            store
                .insert(vec![TaskResource::new(
                    TaskId::from(task),
                    ResourceType::Repository,
                    repo,
                    vec![op],
                )])
                .unwrap();
        })
    }

    /// Journal a call as queued at 12:`minute` on 2026-01-01
    pub fn journaled(&self, task: &str, minute: u32, request: CallRequest) -> &Self {
        self.with_store(|store| {
            store
                .save(QueuedCall {
                    task_id: TaskId::from(task),
                    queued_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap(),
                    request,
                })
                .unwrap();
        })
    }

    pub fn ledger_rows(&self) -> usize {
        let mut rows = 0;
        self.with_store(|store| rows = store.entries().unwrap().len());
        rows
    }

    /// `dispatchctl` pointed at this workspace's state directory
    pub fn dispatchctl(&self) -> CliBuilder {
        let mut cmd = Command::cargo_bin("dispatchctl").unwrap();
        cmd.env("XDG_CONFIG_HOME", self.path().join("xdg"))
            .env("RUST_LOG", "warn")
            .arg("--state-dir")
            .arg(self.state_dir());
        CliBuilder { cmd }
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.arg(arg);
        self
    }

    pub fn passes(self) -> RunAssert {
        self.exits_with(0)
    }

    pub fn fails(mut self) -> RunAssert {
        RunAssert {
            assert: self.cmd.assert().failure(),
        }
    }

    pub fn exits_with(mut self, code: i32) -> RunAssert {
        RunAssert {
            assert: self.cmd.assert().code(code),
        }
    }
}

pub struct RunAssert {
    assert: assert_cmd::assert::Assert,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.assert.get_output().stdout).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        Self {
            assert: self.assert.stdout(predicate::str::contains(expected)),
        }
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        Self {
            assert: self
                .assert
                .stdout(predicate::str::contains(unexpected).not()),
        }
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        Self {
            assert: self.assert.stderr(predicate::str::contains(expected)),
        }
    }

    pub fn stdout_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap()
    }
}
