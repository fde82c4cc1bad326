// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use crate::error::StoreError;
use crate::journal::QueuedCall;
use crate::ledger::TaskResource;
use crate::op::StoreOp;
use crate::wal::Wal;
use dispatch_core::ResourceKey;
use std::path::Path;

/// Ledger rows and journaled calls built from store operations
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaterializedState {
    pub ledger: Vec<TaskResource>,
    /// In the order calls were journaled
    pub calls: Vec<QueuedCall>,
}

impl MaterializedState {
    pub fn from_ops<'a>(ops: impl IntoIterator<Item = &'a StoreOp>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    /// Replay the log at `path` without taking the store lock or creating
    /// anything. A missing log reads as empty.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let ops = Wal::replay(path)?;
        Ok(Self::from_ops(&ops))
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &StoreOp) {
        match op {
            StoreOp::LedgerInsert { rows } => {
                self.ledger.extend(rows.iter().cloned());
            }

            StoreOp::LedgerRemove { task_id } => {
                self.ledger.retain(|row| &row.task_id != task_id);
            }

            StoreOp::LedgerClear => self.ledger.clear(),

            StoreOp::CallQueued { call } => {
                self.calls.retain(|c| c.task_id != call.task_id);
                self.calls.push(call.clone());
            }

            StoreOp::CallDequeued { task_id } => {
                self.calls.retain(|c| &c.task_id != task_id);
            }

            StoreOp::JournalClear => self.calls.clear(),
        }
    }

    pub fn find(&self, keys: &[ResourceKey]) -> Vec<TaskResource> {
        self.ledger
            .iter()
            .filter(|row| keys.iter().any(|key| row.matches(key)))
            .cloned()
            .collect()
    }

    /// The shortest op sequence that rebuilds this state
    pub fn snapshot_ops(&self) -> Vec<StoreOp> {
        let mut ops = Vec::new();
        let mut rows = self.ledger.iter().peekable();
        while let Some(first) = rows.next() {
            let mut group = vec![first.clone()];
            while let Some(next) = rows.next_if(|r| r.task_id == first.task_id) {
                group.push(next.clone());
            }
            ops.push(StoreOp::LedgerInsert { rows: group });
        }
        ops.extend(
            self.calls
                .iter()
                .map(|call| StoreOp::CallQueued { call: call.clone() }),
        );
        ops
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
