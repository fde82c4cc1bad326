// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal of queued calls, replayed on startup to resubmit interrupted work

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use dispatch_core::{CallRequest, TaskId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A call that was queued or running when it was journaled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCall {
    pub task_id: TaskId,
    pub queued_at: DateTime<Utc>,
    pub request: CallRequest,
}

/// Storage contract for the queued-call journal
pub trait CallJournal: Send + Sync {
    fn save(&self, call: QueuedCall) -> Result<(), StoreError>;

    /// Forget a call; forgetting an unknown task is not an error
    fn remove(&self, task_id: &TaskId) -> Result<bool, StoreError>;

    /// Journaled calls in queue order
    fn load(&self) -> Result<Vec<QueuedCall>, StoreError>;

    fn clear(&self) -> Result<usize, StoreError>;
}

impl<J: CallJournal + ?Sized> CallJournal for Arc<J> {
    fn save(&self, call: QueuedCall) -> Result<(), StoreError> {
        (**self).save(call)
    }

    fn remove(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        (**self).remove(task_id)
    }

    fn load(&self) -> Result<Vec<QueuedCall>, StoreError> {
        (**self).load()
    }

    fn clear(&self) -> Result<usize, StoreError> {
        (**self).clear()
    }
}

/// Orders calls by queue time, keeping insertion order for ties
pub(crate) fn sort_queue_order(calls: &mut [QueuedCall]) {
    calls.sort_by_key(|call| call.queued_at);
}

/// In-memory journal
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    calls: Arc<Mutex<Vec<QueuedCall>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<QueuedCall>> for MemoryJournal {
    fn from(calls: Vec<QueuedCall>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(calls)),
        }
    }
}

impl CallJournal for MemoryJournal {
    fn save(&self, call: QueuedCall) -> Result<(), StoreError> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.retain(|c| c.task_id != call.task_id);
        calls.push(call);
        Ok(())
    }

    fn remove(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let before = calls.len();
        calls.retain(|c| &c.task_id != task_id);
        Ok(calls.len() != before)
    }

    fn load(&self) -> Result<Vec<QueuedCall>, StoreError> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone();
        sort_queue_order(&mut calls);
        Ok(calls)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let removed = calls.len();
        calls.clear();
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
