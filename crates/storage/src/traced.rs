// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced ledger wrapper for consistent observability

use crate::error::StoreError;
use crate::ledger::{LedgerStore, TaskResource};
use dispatch_core::{ResourceKey, TaskId};
use std::time::Instant;

/// Wrapper that adds tracing to any LedgerStore
#[derive(Clone)]
pub struct TracedLedger<L> {
    inner: L,
}

impl<L> TracedLedger<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: LedgerStore> LedgerStore for TracedLedger<L> {
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError> {
        let task_id = rows.first().map(|r| r.task_id.to_string());
        let span = tracing::info_span!("ledger.insert", task_id = task_id.as_deref().unwrap_or(""));
        let _guard = span.enter();

        let count = rows.len();
        let start = Instant::now();
        let result = self.inner.insert(rows);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::debug!(rows = count, elapsed_ms, "inserted"),
            Err(e) => tracing::error!(rows = count, elapsed_ms, error = %e, "insert failed"),
        }

        result
    }

    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError> {
        let result = self.inner.find(keys);
        match &result {
            Ok(found) => tracing::trace!(keys = keys.len(), found = found.len(), "ledger lookup"),
            Err(e) => tracing::error!(keys = keys.len(), error = %e, "ledger lookup failed"),
        }
        result
    }

    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        let span = tracing::info_span!("ledger.remove", %task_id);
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.remove(task_id);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(removed) => tracing::debug!(removed, elapsed_ms, "removed"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "remove failed"),
        }

        result
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let span = tracing::info_span!("ledger.clear");
        let _guard = span.enter();

        let result = self.inner.clear();
        match &result {
            Ok(removed) => tracing::info!(removed, "cleared"),
            Err(e) => tracing::error!(error = %e, "clear failed"),
        }
        result
    }

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError> {
        self.inner.entries()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
