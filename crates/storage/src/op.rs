// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store mutations, one WAL record each

use crate::journal::QueuedCall;
use crate::ledger::TaskResource;
use dispatch_core::TaskId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreOp {
    /// All ledger rows for one admission
    LedgerInsert { rows: Vec<TaskResource> },
    LedgerRemove { task_id: TaskId },
    LedgerClear,
    CallQueued { call: QueuedCall },
    CallDequeued { task_id: TaskId },
    JournalClear,
}
