// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executable tasks and the handles callers hold on them

use chrono::{DateTime, Utc};
use dispatch_core::{
    CallReport, CallRequest, CallResponse, Clock, ConflictReason, Lifecycle, TaskEvent, TaskId,
    TaskState,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

type CompletionHook = Box<dyn FnOnce(&CallReport) + Send>;

/// An admitted call request wrapped for the task queue
pub struct Task {
    id: TaskId,
    request: Arc<CallRequest>,
    report: Arc<watch::Sender<CallReport>>,
    /// Tasks that must finish first, with the terminal states this task accepts
    dependencies: BTreeMap<TaskId, Vec<TaskState>>,
    on_complete: Vec<CompletionHook>,
    canceled: Arc<AtomicBool>,
    queued_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        request: CallRequest,
        response: CallResponse,
        reasons: Vec<ConflictReason>,
    ) -> Self {
        let report = CallReport::admitted(&request, response, reasons, id.clone());
        let (tx, _) = watch::channel(report);
        Self {
            id,
            request: Arc::new(request),
            report: Arc::new(tx),
            dependencies: BTreeMap::new(),
            on_complete: Vec::new(),
            canceled: Arc::new(AtomicBool::new(false)),
            queued_at: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn request(&self) -> &Arc<CallRequest> {
        &self.request
    }

    pub fn call_report(&self) -> CallReport {
        self.report.borrow().clone()
    }

    pub fn state(&self) -> Option<TaskState> {
        self.report.borrow().state
    }

    pub fn weight(&self) -> u32 {
        self.request.weight
    }

    pub fn handle(&self) -> CallHandle {
        CallHandle {
            task_id: Some(self.id.clone()),
            rx: self.report.subscribe(),
        }
    }

    pub fn blocking_tasks(&self) -> BTreeSet<TaskId> {
        self.dependencies.keys().cloned().collect()
    }

    /// Block on each task until it reaches any terminal state.
    /// Existing, more specific dependencies on the same task are kept.
    pub fn set_blocking_tasks(&mut self, blocking: impl IntoIterator<Item = TaskId>) {
        for id in blocking {
            self.dependencies
                .entry(id)
                .or_insert_with(|| TaskState::TERMINAL.to_vec());
        }
    }

    /// Block on a task until it reaches one of `states`
    pub fn add_dependency(&mut self, task_id: TaskId, states: Vec<TaskState>) {
        self.dependencies.insert(task_id, states);
    }

    pub(crate) fn dependencies(&self) -> &BTreeMap<TaskId, Vec<TaskState>> {
        &self.dependencies
    }

    pub(crate) fn dependencies_mut(&mut self) -> &mut BTreeMap<TaskId, Vec<TaskState>> {
        &mut self.dependencies
    }

    pub fn is_ready(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Run `hook` once when the task reaches a terminal state
    pub fn on_complete(&mut self, hook: impl FnOnce(&CallReport) + Send + 'static) {
        self.on_complete.push(Box::new(hook));
    }

    pub(crate) fn canceled_flag(&self) -> Arc<AtomicBool> {
        self.canceled.clone()
    }

    pub(crate) fn report_sender(&self) -> Arc<watch::Sender<CallReport>> {
        self.report.clone()
    }

    pub fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.queued_at
    }

    pub(crate) fn mark_queued(&mut self, at: DateTime<Utc>) {
        self.queued_at = Some(at);
    }

    /// Apply an event to the report, returning the lifecycle points reached.
    /// Completion hooks run here, exactly once, before waiters observe the
    /// terminal report.
    pub fn apply(&mut self, event: TaskEvent, clock: &impl Clock) -> Vec<Lifecycle> {
        let mut points = Vec::new();
        let on_complete = &mut self.on_complete;
        self.report.send_if_modified(|report| {
            let (next, reached) = report.transition(event, clock);
            points = reached;
            *report = next;
            if points.contains(&Lifecycle::Complete) {
                for hook in std::mem::take(on_complete) {
                    hook(report);
                }
            }
            !points.is_empty()
        });
        points
    }

    /// Replace the progress report while the task is live
    pub fn set_progress(&self, progress: serde_json::Value) -> bool {
        set_progress(&self.report, progress)
    }
}

pub(crate) fn set_progress(report: &watch::Sender<CallReport>, progress: serde_json::Value) -> bool {
    report.send_if_modified(|r| {
        if r.is_terminal() {
            return false;
        }
        r.progress = progress;
        true
    })
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("task_type", &self.request.task_type)
            .field("state", &self.state())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Live view of a submitted call's report
#[derive(Debug, Clone)]
pub struct CallHandle {
    task_id: Option<TaskId>,
    rx: watch::Receiver<CallReport>,
}

impl CallHandle {
    /// Handle for a report that will never change, such as a rejection
    pub fn settled(report: CallReport) -> Self {
        let (_, rx) = watch::channel(report.clone());
        Self {
            task_id: report.task_id,
            rx,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    /// Current snapshot of the report
    pub fn report(&self) -> CallReport {
        self.rx.borrow().clone()
    }

    pub fn response(&self) -> CallResponse {
        self.rx.borrow().response
    }

    /// Wait until the report satisfies `pred`, or the task is gone
    pub async fn wait_for(&self, pred: impl FnMut(&CallReport) -> bool) -> CallReport {
        let mut rx = self.rx.clone();
        let result = rx.wait_for(pred).await.map(|r| r.clone());
        result.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Wait until the task has started (or already finished)
    pub async fn wait_until_running(&self) -> CallReport {
        self.wait_for(|r| r.state != Some(TaskState::Waiting)).await
    }

    /// Like [`wait_until_running`](Self::wait_until_running), giving up after `timeout`
    pub async fn wait_until_running_for(&self, timeout: Duration) -> Option<CallReport> {
        tokio::time::timeout(timeout, self.wait_until_running())
            .await
            .ok()
    }

    pub async fn wait_until_complete(&self) -> CallReport {
        self.wait_for(CallReport::is_terminal).await
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
