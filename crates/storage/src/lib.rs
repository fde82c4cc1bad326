// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dispatch-storage: resource ledger and queued-call journal
//!
//! The ledger records which task holds which operations on which resources.
//! The journal records calls that are queued or running so they can be
//! resubmitted after a crash. Both have in-memory implementations and a
//! single WAL-backed durable store.

mod error;
mod journal;
mod ledger;
mod op;
mod state;
mod store;
mod traced;
mod wal;

pub use error::StoreError;
pub use journal::{CallJournal, MemoryJournal, QueuedCall};
pub use ledger::{LedgerStore, MemoryLedger, TaskResource};
pub use op::StoreOp;
pub use state::MaterializedState;
pub use store::{CompactStats, WalStore};
pub use traced::TracedLedger;
pub use wal::{Wal, WalError};
