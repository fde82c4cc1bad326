// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource ledger
//!
//! One row per resource touched by a task that is queued or running. Rows for
//! a task are written together at admission and removed together when the
//! task reaches a terminal state.

use crate::error::StoreError;
use dispatch_core::{Operation, ResourceKey, ResourceType, TaskId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A task's claim on a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResource {
    pub task_id: TaskId,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub operations: Vec<Operation>,
}

impl TaskResource {
    pub fn new(
        task_id: TaskId,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            task_id,
            resource_type,
            resource_id: resource_id.into(),
            operations,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type, self.resource_id.clone())
    }

    pub fn matches(&self, key: &ResourceKey) -> bool {
        self.resource_type == key.resource_type && self.resource_id == key.resource_id
    }
}

/// Storage contract for the resource ledger
pub trait LedgerStore: Send + Sync {
    /// Insert all rows or none of them
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError>;

    /// Rows on any of the given resources
    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError>;

    /// Remove every row held by a task, returning how many were removed.
    /// Removing an absent task is not an error.
    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError>;

    /// Drop every row
    fn clear(&self) -> Result<usize, StoreError>;

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError>;
}

impl<L: LedgerStore + ?Sized> LedgerStore for Arc<L> {
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError> {
        (**self).insert(rows)
    }

    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError> {
        (**self).find(keys)
    }

    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        (**self).remove(task_id)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        (**self).clear()
    }

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError> {
        (**self).entries()
    }
}

/// In-memory ledger
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    rows: Arc<Mutex<Vec<TaskResource>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<TaskResource>> for MemoryLedger {
    fn from(rows: Vec<TaskResource>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }
}

impl LedgerStore for MemoryLedger {
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(rows);
        Ok(())
    }

    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .iter()
            .filter(|row| keys.iter().any(|key| row.matches(key)))
            .cloned()
            .collect())
    }

    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|row| &row.task_id != task_id);
        Ok(before - rows.len())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError> {
        Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
