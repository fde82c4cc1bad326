// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dispatch-core: value types for the task dispatch coordination engine
//!
//! This crate provides:
//! - Resources and the operation compatibility matrix
//! - `CallRequest` / `CallReport` work items
//! - The pure task state machine
//! - The handler and hook registry that replaces opaque callables
//! - Clock, id generation and configuration

pub mod clock;
pub mod config;
pub mod id;

pub mod call;
pub mod operation;
pub mod registry;
pub mod resource;
pub mod task;

// Re-exports
pub use call::{
    CallReport, CallRequest, CallResponse, ConflictReason, ControlPoint, Lifecycle, JOB_TAG_PREFIX,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, DispatchConfig, LogConfig, QueueConfig, StorageConfig};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use operation::{classify, postponing_operations, rejecting_operations, Conflict, Operation};
pub use registry::{CallContext, CallError, Handler, Hook, Registry, RegistryError};
pub use resource::{ParseResourceError, ResourceKey, ResourceType, Resources};
pub use task::{TaskEvent, TaskId, TaskState};
