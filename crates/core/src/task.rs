// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine
//!
//! A task is the executable wrapper the coordinator creates for an admitted
//! call. Its lifecycle lives on the call report:
//!
//! ```text
//! Waiting -> Running -> Succeeded | Failed | Canceled
//! Waiting -> Canceled
//! ```
//!
//! Transitions are pure: they return the next report plus the lifecycle
//! points whose hooks the caller must fire. Invalid events leave the report
//! untouched and fire nothing, which is what makes completion exactly-once.

use crate::call::{CallReport, Lifecycle};
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// The state of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, possibly behind blocking tasks
    Waiting,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskState {
    pub const TERMINAL: [TaskState; 3] =
        [TaskState::Succeeded, TaskState::Failed, TaskState::Canceled];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Canceled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        })
    }
}

/// Events that can change task state
#[derive(Clone, Debug, PartialEq)]
pub enum TaskEvent {
    /// Blockers are clear and a worker picked the task up
    Start,
    Succeed { result: Value },
    Fail {
        exception: String,
        traceback: Option<String>,
    },
    /// Cancel before it runs, or after a cancel control hook interrupted it
    Cancel,
}

impl CallReport {
    /// Pure transition function - returns the next report and the lifecycle
    /// points reached, in firing order
    pub fn transition(&self, event: TaskEvent, clock: &impl Clock) -> (CallReport, Vec<Lifecycle>) {
        let now = clock.now();

        match (self.state, event) {
            // Waiting → Running
            (Some(TaskState::Waiting), TaskEvent::Start) => {
                let report = CallReport {
                    state: Some(TaskState::Running),
                    start_time: Some(now),
                    ..self.clone()
                };
                (report, vec![Lifecycle::Run])
            }

            // Running → Succeeded
            (Some(TaskState::Running), TaskEvent::Succeed { result }) => {
                let report = CallReport {
                    state: Some(TaskState::Succeeded),
                    result: Some(result),
                    finish_time: Some(now),
                    ..self.clone()
                };
                (report, vec![Lifecycle::Success, Lifecycle::Complete])
            }

            // Running → Failed
            (
                Some(TaskState::Running),
                TaskEvent::Fail {
                    exception,
                    traceback,
                },
            ) => {
                let report = CallReport {
                    state: Some(TaskState::Failed),
                    exception: Some(exception),
                    traceback,
                    finish_time: Some(now),
                    ..self.clone()
                };
                (report, vec![Lifecycle::Failure, Lifecycle::Complete])
            }

            // Waiting/Running → Canceled
            (Some(TaskState::Waiting | TaskState::Running), TaskEvent::Cancel) => {
                let report = CallReport {
                    state: Some(TaskState::Canceled),
                    finish_time: Some(now),
                    ..self.clone()
                };
                (report, vec![Lifecycle::Cancel, Lifecycle::Complete])
            }

            // Everything else, including any event after a terminal state
            _ => (self.clone(), vec![]),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
