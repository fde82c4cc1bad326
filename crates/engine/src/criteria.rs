// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call report queries

use dispatch_core::{CallReport, CallRequest, TaskId, TaskState};

/// Filter over submitted calls. Unset fields match anything; every set
/// field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCriteria {
    pub call_request_id: Option<String>,
    pub task_id: Option<TaskId>,
    pub job_id: Option<String>,
    pub schedule_id: Option<String>,
    pub state: Option<TaskState>,
    pub task_type: Option<String>,
    /// The call must carry all of these tags
    pub tags: Vec<String>,
}

impl CallCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_request_id(mut self, id: impl Into<String>) -> Self {
        self.call_request_id = Some(id.into());
        self
    }

    pub fn task_id(mut self, id: impl Into<TaskId>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    pub fn schedule_id(mut self, id: impl Into<String>) -> Self {
        self.schedule_id = Some(id.into());
        self
    }

    pub fn state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn matches(&self, request: &CallRequest, report: &CallReport) -> bool {
        fn field<T: PartialEq + ?Sized>(want: Option<&T>, have: Option<&T>) -> bool {
            want.map_or(true, |want| have == Some(want))
        }

        field(self.call_request_id.as_deref(), Some(report.call_request_id.as_str()))
            && field(self.task_id.as_ref(), report.task_id.as_ref())
            && field(self.job_id.as_deref(), report.job_id.as_deref())
            && field(self.schedule_id.as_deref(), report.schedule_id.as_deref())
            && field(self.state.as_ref(), report.state.as_ref())
            && field(self.task_type.as_deref(), Some(request.task_type.as_str()))
            && self.tags.iter().all(|tag| request.tags.contains(tag))
    }
}

#[cfg(test)]
#[path = "criteria_tests.rs"]
mod tests;
