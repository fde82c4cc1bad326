// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the dispatch engine

use dispatch_core::{RegistryError, TaskId};
use dispatch_storage::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned to submitters and controllers
///
/// Rejection is not an error; it is reported through the call report.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("task {task_id} did not start within {timeout:?}")]
    SynchronousCallTimeout { task_id: TaskId, timeout: Duration },
    #[error("asynchronous call {0} cannot be executed synchronously")]
    AsynchronousExecution(String),
    #[error("dependency cycle among call requests: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
    #[error("coordinator is already started")]
    AlreadyStarted,
}
