// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-backed ledger and journal
//!
//! Every mutation is appended to the WAL before it is applied to the
//! in-memory state, so a failed append leaves the state untouched. An
//! exclusive lock file keeps a second process from opening the same log.

use crate::error::StoreError;
use crate::journal::{sort_queue_order, CallJournal, QueuedCall};
use crate::ledger::{LedgerStore, TaskResource};
use crate::op::StoreOp;
use crate::state::MaterializedState;
use crate::wal::Wal;
use dispatch_core::{ResourceKey, TaskId};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Record counts before and after a compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    pub before: u64,
    pub after: u64,
}

struct Inner {
    path: PathBuf,
    wal: Wal,
    state: MaterializedState,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    _lock: File,
}

/// Durable store implementing both [`LedgerStore`] and [`CallJournal`]
#[derive(Clone)]
pub struct WalStore {
    inner: Arc<Mutex<Inner>>,
}

impl WalStore {
    /// Open (creating if needed) the log at `path` and replay it
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(path.to_path_buf()))?;

        let ops = Wal::replay(path)?;
        let state = MaterializedState::from_ops(&ops);
        let wal = Wal::open(path)?;

        tracing::debug!(
            path = %path.display(),
            records = wal.sequence(),
            ledger_rows = state.ledger.len(),
            queued_calls = state.calls.len(),
            "opened store"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: path.to_path_buf(),
                wal,
                state,
                _lock: lock,
            })),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Copy of the current materialized state
    pub fn snapshot(&self) -> MaterializedState {
        self.lock().state.clone()
    }

    /// Rewrite the log to the minimal set of records for the current state
    pub fn compact(&self) -> Result<CompactStats, StoreError> {
        let mut inner = self.lock();
        let before = inner.wal.sequence();
        let ops = inner.state.snapshot_ops();
        Wal::rewrite(&inner.path, &ops)?;
        inner.wal = Wal::open(&inner.path)?;
        let after = inner.wal.sequence();
        tracing::info!(before, after, "compacted store");
        Ok(CompactStats { before, after })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn commit(&mut self, op: StoreOp) -> Result<(), StoreError> {
        self.wal.append(&op)?;
        self.state.apply(&op);
        Ok(())
    }
}

impl LedgerStore for WalStore {
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.lock().commit(StoreOp::LedgerInsert { rows })
    }

    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError> {
        Ok(self.lock().state.find(keys))
    }

    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let held = inner
            .state
            .ledger
            .iter()
            .filter(|row| &row.task_id == task_id)
            .count();
        if held == 0 {
            return Ok(0);
        }
        inner.commit(StoreOp::LedgerRemove {
            task_id: task_id.clone(),
        })?;
        Ok(held)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let held = inner.state.ledger.len();
        inner.commit(StoreOp::LedgerClear)?;
        Ok(held)
    }

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError> {
        Ok(self.lock().state.ledger.clone())
    }
}

impl CallJournal for WalStore {
    fn save(&self, call: QueuedCall) -> Result<(), StoreError> {
        self.lock().commit(StoreOp::CallQueued { call })
    }

    fn remove(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if !inner.state.calls.iter().any(|c| &c.task_id == task_id) {
            return Ok(false);
        }
        inner.commit(StoreOp::CallDequeued {
            task_id: task_id.clone(),
        })?;
        Ok(true)
    }

    fn load(&self) -> Result<Vec<QueuedCall>, StoreError> {
        let mut calls = self.lock().state.calls.clone();
        sort_queue_order(&mut calls);
        Ok(calls)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let held = inner.state.calls.len();
        inner.commit(StoreOp::JournalClear)?;
        Ok(held)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
