// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call requests and call reports
//!
//! A [`CallRequest`] describes a unit of work plus the resources it touches.
//! The callable itself is named by `task_type` and resolved through the
//! [`Registry`](crate::registry::Registry) at execution time, so a request is
//! plain data and can be journaled and replayed.
//!
//! A [`CallReport`] is the live status record for a submitted request. Its
//! `response` and `reasons` are final at submission; `state`, timestamps and
//! results move as the task queue runs the task.

use crate::operation::Operation;
use crate::resource::{ResourceType, Resources};
use crate::task::{TaskId, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Tag prefix carrying the job id of a job member
pub const JOB_TAG_PREFIX: &str = "job:";

const OBFUSCATED: &str = "**OBFUSCATED**";

/// Admission decision for a submitted call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResponse {
    Accepted,
    Postponed,
    Rejected,
}

impl fmt::Display for CallResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallResponse::Accepted => "accepted",
            CallResponse::Postponed => "postponed",
            CallResponse::Rejected => "rejected",
        })
    }
}

/// Why a call was postponed or rejected: the held operation and its holder
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictReason {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub operation: Operation,
    pub task_id: TaskId,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} held for {} by {}",
            self.resource_type, self.resource_id, self.operation, self.task_id
        )
    }
}

/// Points in a call's life at which execution hooks fire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Enqueue,
    Dequeue,
    Run,
    Success,
    Failure,
    Cancel,
    Complete,
}

/// Points at which a single control hook may take over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPoint {
    /// Interrupt a running call
    Cancel,
}

/// Description of work submitted to the coordinator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub id: String,
    /// Registered handler name
    pub task_type: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub resources: Resources,
    /// Call request ids this call waits on, with the terminal states it accepts
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<TaskState>>,
    /// Relative cost for queue concurrency throttling
    pub weight: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub asynchronous: bool,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub obfuscate_args: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub execution_hooks: BTreeMap<Lifecycle, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub control_hooks: BTreeMap<ControlPoint, String>,
}

impl CallRequest {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: task_type.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            resources: Resources::new(),
            dependencies: BTreeMap::new(),
            weight: 1,
            tags: Vec::new(),
            asynchronous: false,
            archive: false,
            obfuscate_args: false,
            schedule_id: None,
            execution_hooks: BTreeMap::new(),
            control_hooks: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_schedule_id(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    /// Completion is reported externally instead of by the handler's return
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    pub fn archived(mut self) -> Self {
        self.archive = true;
        self
    }

    pub fn obfuscated(mut self) -> Self {
        self.obfuscate_args = true;
        self
    }

    pub fn creates_resource(self, resource_type: ResourceType, id: impl Into<String>) -> Self {
        self.declares(resource_type, id, Operation::Create)
    }

    pub fn reads_resource(self, resource_type: ResourceType, id: impl Into<String>) -> Self {
        self.declares(resource_type, id, Operation::Read)
    }

    pub fn updates_resource(self, resource_type: ResourceType, id: impl Into<String>) -> Self {
        self.declares(resource_type, id, Operation::Update)
    }

    pub fn deletes_resource(self, resource_type: ResourceType, id: impl Into<String>) -> Self {
        self.declares(resource_type, id, Operation::Delete)
    }

    fn declares(
        mut self,
        resource_type: ResourceType,
        id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        self.resources.insert(resource_type, id, operation);
        self
    }

    /// Wait on another call; an empty state list accepts any terminal state
    pub fn depends_on(
        mut self,
        call_request_id: impl Into<String>,
        states: impl IntoIterator<Item = TaskState>,
    ) -> Self {
        let mut states: Vec<TaskState> = states.into_iter().collect();
        if states.is_empty() {
            states = TaskState::TERMINAL.to_vec();
        }
        self.dependencies.insert(call_request_id.into(), states);
        self
    }

    /// Subscribe a registered hook to a lifecycle point, after any existing ones
    pub fn add_execution_hook(mut self, point: Lifecycle, hook: impl Into<String>) -> Self {
        self.execution_hooks
            .entry(point)
            .or_default()
            .push(hook.into());
        self
    }

    pub fn add_control_hook(mut self, point: ControlPoint, hook: impl Into<String>) -> Self {
        self.control_hooks.insert(point, hook.into());
        self
    }

    pub fn hooks_for(&self, point: Lifecycle) -> &[String] {
        self.execution_hooks
            .get(&point)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn callable_name(&self) -> &str {
        &self.task_type
    }

    /// Job this request was submitted with, if any
    pub fn job_id(&self) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|tag| tag.strip_prefix(JOB_TAG_PREFIX))
    }

    /// Replace any previous job tag
    pub fn set_job_id(&mut self, job_id: &str) {
        self.tags.retain(|tag| !tag.starts_with(JOB_TAG_PREFIX));
        self.tags.push(format!("{JOB_TAG_PREFIX}{job_id}"));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    fn args_reprs(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                if self.obfuscate_args {
                    OBFUSCATED.to_string()
                } else {
                    a.to_string()
                }
            })
            .collect()
    }

    fn kwargs_reprs(&self) -> Vec<String> {
        self.kwargs
            .iter()
            .map(|(k, v)| {
                if self.obfuscate_args {
                    format!("{k}={OBFUSCATED}")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect()
    }
}

impl fmt::Display for CallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all_args: Vec<String> = self
            .args_reprs()
            .into_iter()
            .chain(self.kwargs_reprs())
            .collect();
        write!(
            f,
            "CallRequest: {}({})",
            self.callable_name(),
            all_args.join(", ")
        )
    }
}

/// Live status record for a submitted call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallReport {
    pub call_request_id: String,
    pub response: CallResponse,
    pub reasons: Vec<ConflictReason>,
    /// `None` for rejected calls, which never become tasks
    pub state: Option<TaskState>,
    pub task_id: Option<TaskId>,
    pub job_id: Option<String>,
    pub schedule_id: Option<String>,
    pub progress: Value,
    pub result: Option<Value>,
    pub exception: Option<String>,
    pub traceback: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl CallReport {
    /// Report for a call refused at admission
    pub fn rejected(request: &CallRequest, reasons: Vec<ConflictReason>) -> Self {
        Self {
            reasons,
            ..Self::base(request, CallResponse::Rejected)
        }
    }

    /// Report for an admitted call, waiting to run
    pub fn admitted(
        request: &CallRequest,
        response: CallResponse,
        reasons: Vec<ConflictReason>,
        task_id: TaskId,
    ) -> Self {
        Self {
            reasons,
            state: Some(TaskState::Waiting),
            task_id: Some(task_id),
            ..Self::base(request, response)
        }
    }

    fn base(request: &CallRequest, response: CallResponse) -> Self {
        Self {
            call_request_id: request.id.clone(),
            response,
            reasons: Vec::new(),
            state: None,
            task_id: None,
            job_id: request.job_id().map(str::to_string),
            schedule_id: request.schedule_id.clone(),
            progress: Value::Null,
            result: None,
            exception: None,
            traceback: None,
            start_time: None,
            finish_time: None,
            tags: request.tags.clone(),
        }
    }

    /// Rejected calls count as terminal: nothing further will happen to them
    pub fn is_terminal(&self) -> bool {
        self.state.map_or(true, |s| s.is_terminal())
    }
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
