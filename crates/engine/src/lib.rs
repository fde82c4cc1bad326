// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dispatch-engine: admission control and task execution
//!
//! The [`Coordinator`] decides whether each submitted call may run now,
//! must wait behind conflicting work, or is refused, and records its
//! resource claims in the ledger. The [`TaskQueue`] runs admitted tasks in
//! blocking order under a weight-based concurrency limit.

mod conflict;
mod coordinator;
mod criteria;
mod error;
mod job;
mod queue;
mod task;

#[cfg(test)]
mod testing;

pub use conflict::{claims, find_conflicts, Admission};
pub use coordinator::{Coordinator, CoordinatorDeps, Recovery, SubmitMode};
pub use criteria::CallCriteria;
pub use error::DispatchError;
pub use job::{topological_order, JobHandle};
pub use queue::{AdmissionGuard, QueueCounts, TaskQueue};
pub use task::{CallHandle, Task};
