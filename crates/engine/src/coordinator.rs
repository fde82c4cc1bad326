// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator: admission, submission and control of calls
//!
//! Admission runs under the task queue's lock so that conflict detection,
//! the ledger write and the enqueue are one step with respect to every
//! other submission. A task's ledger rows are released when it completes.

use crate::conflict::{claims, find_conflicts};
use crate::criteria::CallCriteria;
use crate::error::DispatchError;
use crate::job::{topological_order, JobHandle};
use crate::queue::{AdmissionGuard, QueueCounts, TaskQueue};
use crate::task::{CallHandle, Task};
use dispatch_core::{
    CallReport, CallRequest, CallResponse, Clock, IdGen, QueueConfig, Registry, SystemClock,
    TaskEvent, TaskId, UuidIdGen,
};
use dispatch_storage::{
    CallJournal, LedgerStore, MemoryJournal, MemoryLedger, TracedLedger, WalStore,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Storage and handler dependencies of a coordinator
pub struct CoordinatorDeps {
    pub registry: Arc<Registry>,
    pub ledger: Arc<dyn LedgerStore>,
    pub journal: Arc<dyn CallJournal>,
}

impl CoordinatorDeps {
    /// Nothing survives the process
    pub fn in_memory(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            ledger: Arc::new(MemoryLedger::new()),
            journal: Arc::new(MemoryJournal::new()),
        }
    }

    /// Ledger and journal share one write-ahead log
    pub fn durable(registry: Registry, store: WalStore) -> Self {
        Self {
            registry: Arc::new(registry),
            ledger: Arc::new(store.clone()),
            journal: Arc::new(store),
        }
    }
}

/// How long `submit` waits before returning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// Wait for completion only when the call was accepted outright
    #[default]
    Default,
    /// Wait for completion. If the task has not started within `timeout` it
    /// is pulled from the queue and the submission fails.
    Synchronous { timeout: Option<Duration> },
    /// Return as soon as the call is admitted
    Asynchronous,
}

/// What `start` found and resubmitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    pub ledger_rows_dropped: usize,
    pub resubmitted: usize,
    pub skipped: usize,
}

type SharedLedger = Arc<TracedLedger<Arc<dyn LedgerStore>>>;

/// Admits calls against the resource ledger and hands them to the task queue
pub struct Coordinator<C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    registry: Arc<Registry>,
    ledger: SharedLedger,
    journal: Arc<dyn CallJournal>,
    queue: TaskQueue<C>,
    id_gen: I,
    running: AtomicBool,
    /// Recovery runs once; a restart after `stop` resumes the queue
    recovered: AtomicBool,
}

impl Coordinator {
    /// Coordinator on the system clock with uuid ids
    pub fn with_defaults(deps: CoordinatorDeps, config: QueueConfig) -> Self {
        Self::new(deps, config, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, I: IdGen> Coordinator<C, I> {
    pub fn new(deps: CoordinatorDeps, config: QueueConfig, clock: C, id_gen: I) -> Self {
        let queue = TaskQueue::new(config, deps.registry.clone(), deps.journal.clone(), clock);
        Self {
            registry: deps.registry,
            ledger: Arc::new(TracedLedger::new(deps.ledger)),
            journal: deps.journal,
            queue,
            id_gen,
            running: AtomicBool::new(false),
            recovered: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn clock(&self) -> &C {
        self.queue.clock()
    }

    /// Recover from a previous run and start the task queue.
    ///
    /// Ledger rows from the previous run are dropped. Journaled calls are
    /// resubmitted in queue order: ungrouped calls asynchronously and each
    /// job's members together as a new job. Starting again after
    /// [`stop`](Self::stop) resumes dispatch without recovering.
    pub async fn start(&self) -> Result<Recovery, DispatchError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyStarted);
        }
        if self.recovered.load(Ordering::SeqCst) {
            self.queue.start();
            tracing::info!("coordinator resumed");
            return Ok(Recovery::default());
        }

        let loaded = self.ledger.clear().and_then(|dropped| {
            let queued = self.journal.load()?;
            self.journal.clear()?;
            Ok((dropped, queued))
        });
        let (ledger_rows_dropped, queued) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        self.recovered.store(true, Ordering::SeqCst);
        self.queue.start();

        let mut recovery = Recovery {
            ledger_rows_dropped,
            ..Recovery::default()
        };
        let mut pending: Vec<CallRequest> = queued.into_iter().map(|q| q.request).collect();

        while !pending.is_empty() {
            let request = pending.remove(0);
            let Some(job_id) = request.job_id().map(str::to_string) else {
                match self.submit(request, SubmitMode::Asynchronous).await {
                    Ok(_) => recovery.resubmitted += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot resubmit interrupted call");
                        recovery.skipped += 1;
                    }
                }
                continue;
            };

            let (mut members, rest): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|r| r.job_id() == Some(job_id.as_str()));
            pending = rest;
            members.insert(0, request);

            let count = members.len();
            match self.submit_job(members).await {
                Ok(_) => recovery.resubmitted += count,
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "cannot resubmit interrupted job");
                    recovery.skipped += count;
                }
            }
        }

        tracing::info!(
            ledger_rows_dropped = recovery.ledger_rows_dropped,
            resubmitted = recovery.resubmitted,
            skipped = recovery.skipped,
            "coordinator started"
        );
        Ok(recovery)
    }

    /// Stop the task queue, optionally forgetting every journaled call
    pub async fn stop(&self, clear_queued_calls: bool) -> Result<(), DispatchError> {
        self.queue.stop().await;
        self.running.store(false, Ordering::SeqCst);
        if clear_queued_calls {
            let cleared = self.journal.clear()?;
            tracing::info!(cleared, "cleared queued calls");
        }
        Ok(())
    }

    /// Submit one call.
    ///
    /// Rejection is reported on the returned handle's report, not as an error.
    pub async fn submit(
        &self,
        request: CallRequest,
        mode: SubmitMode,
    ) -> Result<CallHandle, DispatchError> {
        self.registry.validate(&request)?;
        if request.asynchronous && matches!(mode, SubmitMode::Synchronous { .. }) {
            return Err(DispatchError::AsynchronousExecution(request.id));
        }

        let asynchronous = request.asynchronous;
        let handle = {
            let mut guard = self.queue.lock().await;
            self.admit(&mut guard, request)?
        };

        let Some(task_id) = handle.task_id().cloned() else {
            return Ok(handle);
        };
        match mode {
            SubmitMode::Asynchronous => {}
            SubmitMode::Default => {
                if handle.response() == CallResponse::Accepted && !asynchronous {
                    handle.wait_until_running().await;
                    handle.wait_until_complete().await;
                }
            }
            SubmitMode::Synchronous { timeout } => {
                if let Some(timeout) = timeout {
                    if handle.wait_until_running_for(timeout).await.is_none() {
                        let mut guard = self.queue.lock().await;
                        // It may have started between the timeout and the lock
                        if let Some(task) = guard.dequeue(&task_id) {
                            guard.cancel_dequeued(task);
                            tracing::warn!(%task_id, ?timeout, "synchronous call did not start in time");
                            return Err(DispatchError::SynchronousCallTimeout { task_id, timeout });
                        }
                    }
                } else {
                    handle.wait_until_running().await;
                }
                handle.wait_until_complete().await;
            }
        }
        Ok(handle)
    }

    /// Submit related calls as one job.
    ///
    /// Members are admitted in dependency order under a single queue lock,
    /// each decided on its own. Handles come back in submission order.
    pub async fn submit_job(&self, requests: Vec<CallRequest>) -> Result<JobHandle, DispatchError> {
        for request in &requests {
            self.registry.validate(request)?;
        }
        let order = topological_order(&requests).map_err(DispatchError::DependencyCycle)?;

        let job_id = self.id_gen.next_job_id();
        let mut slots: Vec<Option<CallRequest>> = requests.into_iter().map(Some).collect();
        let mut handles: Vec<Option<CallHandle>> = vec![None; slots.len()];

        {
            let mut guard = self.queue.lock().await;
            for i in order {
                let Some(mut request) = slots[i].take() else {
                    continue;
                };
                request.set_job_id(&job_id);
                handles[i] = Some(self.admit(&mut guard, request)?);
            }
        }

        let calls: Vec<CallHandle> = handles.into_iter().flatten().collect();
        tracing::info!(%job_id, members = calls.len(), "job submitted");
        Ok(JobHandle { job_id, calls })
    }

    /// Decide and, unless rejected, record and enqueue one request
    fn admit(
        &self,
        guard: &mut AdmissionGuard<'_, C>,
        request: CallRequest,
    ) -> Result<CallHandle, DispatchError> {
        let admission = find_conflicts(&*self.ledger, &request.resources)?;

        if admission.response == CallResponse::Rejected {
            tracing::info!(
                call_request_id = %request.id,
                task_type = %request.task_type,
                response = %admission.response,
                blocking = admission.blocking.len(),
                "call rejected"
            );
            return Ok(CallHandle::settled(CallReport::rejected(
                &request,
                admission.reasons,
            )));
        }

        let task_id = self.id_gen.next_task_id();
        let dependencies: Vec<_> = request
            .dependencies
            .iter()
            .filter_map(|(call_request_id, states)| {
                guard
                    .live_task_for_request(call_request_id)
                    .map(|id| (id, states.clone()))
            })
            .collect();
        let rows = claims(&task_id, &request.resources);
        let call_request_id = request.id.clone();
        let task_type = request.task_type.clone();

        let mut task = Task::new(
            task_id.clone(),
            request,
            admission.response,
            admission.reasons,
        );
        task.set_blocking_tasks(admission.blocking.iter().cloned());
        for (id, states) in dependencies {
            task.add_dependency(id, states);
        }
        let ledger = self.ledger.clone();
        let owner = task_id.clone();
        task.on_complete(move |_| {
            if let Err(e) = ledger.remove(&owner) {
                tracing::error!(task_id = %owner, error = %e, "failed to release resources");
            }
        });

        self.ledger.insert(rows)?;
        let handle = task.handle();
        let blocking = task.blocking_tasks().len();
        if let Err(e) = guard.enqueue(task) {
            if let Err(e) = self.ledger.remove(&task_id) {
                tracing::error!(%task_id, error = %e, "failed to release resources");
            }
            return Err(e.into());
        }

        tracing::info!(
            %call_request_id,
            %task_id,
            %task_type,
            response = %admission.response,
            blocking,
            "call admitted"
        );
        Ok(handle)
    }

    // Queries

    pub async fn call_report(&self, task_id: &TaskId) -> Option<CallReport> {
        self.queue.call_report(task_id).await
    }

    pub async fn handle(&self, task_id: &TaskId) -> Option<CallHandle> {
        self.queue.handle(task_id).await
    }

    /// Reports of queued, running and recently completed calls matching
    /// `criteria`
    pub async fn find_call_reports(&self, criteria: &CallCriteria) -> Vec<CallReport> {
        self.queue
            .snapshot(true)
            .await
            .into_iter()
            .filter(|(request, report)| criteria.matches(request, report))
            .map(|(_, report)| report)
            .collect()
    }

    pub async fn get_call_reports_by_call_request_ids(
        &self,
        call_request_ids: &[String],
        include_completed: bool,
    ) -> Vec<CallReport> {
        self.queue
            .snapshot(include_completed)
            .await
            .into_iter()
            .map(|(_, report)| report)
            .filter(|report| call_request_ids.contains(&report.call_request_id))
            .collect()
    }

    pub async fn counts(&self) -> QueueCounts {
        self.queue.counts().await
    }

    // Control

    /// Report success of a running asynchronous call
    pub async fn complete_call_success(&self, task_id: &TaskId, result: serde_json::Value) -> bool {
        self.queue
            .complete_async(task_id, TaskEvent::Succeed { result })
            .await
    }

    /// Report failure of a running asynchronous call
    pub async fn complete_call_failure(
        &self,
        task_id: &TaskId,
        exception: impl Into<String>,
        traceback: Option<String>,
    ) -> bool {
        let event = TaskEvent::Fail {
            exception: exception.into(),
            traceback,
        };
        self.queue.complete_async(task_id, event).await
    }

    /// Cancel a call. `None` if it is unknown or already complete.
    pub async fn cancel_call(&self, task_id: &TaskId) -> Option<bool> {
        let outcome = self.queue.cancel(task_id).await;
        tracing::info!(%task_id, ?outcome, "cancel requested");
        outcome
    }

    /// Cancel every live member of a job
    pub async fn cancel_multiple_calls(&self, job_id: &str) -> BTreeMap<TaskId, Option<bool>> {
        let criteria = CallCriteria::new().job_id(job_id);
        let task_ids: Vec<TaskId> = self
            .queue
            .snapshot(false)
            .await
            .into_iter()
            .filter(|(request, report)| criteria.matches(request, report))
            .filter_map(|(_, report)| report.task_id)
            .collect();

        let mut outcomes = BTreeMap::new();
        for task_id in task_ids {
            let outcome = self.queue.cancel(&task_id).await;
            outcomes.insert(task_id, outcome);
        }
        tracing::info!(%job_id, canceled = outcomes.len(), "job cancel requested");
        outcomes
    }

    pub async fn report_call_progress(&self, task_id: &TaskId, progress: serde_json::Value) -> bool {
        self.queue.report_progress(task_id, progress).await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
