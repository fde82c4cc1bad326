// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task queue: ordering, throttling and execution of admitted tasks
//!
//! One async mutex guards the queue's run state. The coordinator holds it
//! across admission through [`TaskQueue::lock`]; the dispatcher and task
//! completion take it for their own bookkeeping. A task runs only once all of
//! its dependencies are terminal and its weight fits under the concurrency
//! threshold.

use crate::task::{set_progress, CallHandle, Task};
use dispatch_core::{
    CallError, CallContext, CallReport, CallRequest, Clock, ControlPoint, Lifecycle, QueueConfig,
    Registry, TaskEvent, TaskId, TaskState,
};
use dispatch_storage::{CallJournal, QueuedCall, StoreError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;

/// Execution hooks waiting to fire outside the queue lock
struct HookFiring {
    request: Arc<CallRequest>,
    report: CallReport,
    points: Vec<Lifecycle>,
}

#[derive(Default)]
struct QueueState {
    /// In enqueue order
    waiting: Vec<Task>,
    running: Vec<Task>,
    /// In completion order
    completed: Vec<Task>,
    running_weight: u32,
}

impl QueueState {
    fn all(&self) -> impl Iterator<Item = &Task> {
        self.completed
            .iter()
            .chain(self.running.iter())
            .chain(self.waiting.iter())
    }

    fn live(&self) -> impl Iterator<Item = &Task> {
        self.running.iter().chain(self.waiting.iter())
    }

    fn take_waiting(&mut self, id: &TaskId) -> Option<Task> {
        let idx = self.waiting.iter().position(|t| t.id() == id)?;
        Some(self.waiting.remove(idx))
    }

    fn take_running(&mut self, id: &TaskId) -> Option<Task> {
        let idx = self.running.iter().position(|t| t.id() == id)?;
        let task = self.running.remove(idx);
        self.running_weight = self.running_weight.saturating_sub(task.weight());
        Some(task)
    }
}

struct Shared<C: Clock> {
    state: Mutex<QueueState>,
    wake: Notify,
    shutdown: watch::Sender<bool>,
    config: QueueConfig,
    registry: Arc<Registry>,
    journal: Arc<dyn CallJournal>,
    clock: C,
    hooks_tx: mpsc::UnboundedSender<HookFiring>,
    hooks_rx: StdMutex<Option<mpsc::UnboundedReceiver<HookFiring>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

/// Queue of admitted tasks
pub struct TaskQueue<C: Clock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for TaskQueue<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Clock> TaskQueue<C> {
    pub fn new(
        config: QueueConfig,
        registry: Arc<Registry>,
        journal: Arc<dyn CallJournal>,
        clock: C,
    ) -> Self {
        let (hooks_tx, hooks_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                shutdown,
                config,
                registry,
                journal,
                clock,
                hooks_tx,
                hooks_rx: StdMutex::new(Some(hooks_rx)),
                workers: StdMutex::new(Vec::new()),
            }),
        }
    }

    pub fn clock(&self) -> &C {
        &self.shared.clock
    }

    /// Start the dispatcher, and the hook runner on first use.
    ///
    /// Returns false if a dispatcher is already running. A stopped queue can
    /// be started again; tasks still waiting in it are picked up.
    pub fn start(&self) -> bool {
        let mut workers = self
            .shared
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if !workers.is_empty() {
            return false;
        }

        let hooks_rx = self
            .shared
            .hooks_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(hooks_rx) = hooks_rx {
            let registry = self.shared.registry.clone();
            let runner = std::thread::Builder::new()
                .name("dispatch-hooks".to_string())
                .spawn(move || run_hooks(registry, hooks_rx));
            if let Err(e) = runner {
                tracing::error!(error = %e, "failed to start hook runner, execution hooks disabled");
            }
        }

        self.shared.shutdown.send_replace(false);
        workers.push(tokio::spawn(dispatch_loop(self.shared.clone())));
        tracing::info!(
            concurrency_threshold = self.shared.config.concurrency_threshold,
            "task queue started"
        );
        true
    }

    /// Stop dispatching. Running handlers are left to finish on their own.
    pub async fn stop(&self) {
        self.shared.shutdown.send_replace(true);
        let workers: Vec<_> = std::mem::take(
            &mut *self
                .shared
                .workers
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "dispatcher exited abnormally");
            }
        }
        tracing::info!("task queue stopped");
    }

    /// Take the admission lock
    pub async fn lock(&self) -> AdmissionGuard<'_, C> {
        AdmissionGuard {
            state: self.shared.state.lock().await,
            shared: &self.shared,
        }
    }

    /// Run one dispatch pass: start ready tasks, purge expired completions
    pub async fn dispatch(&self) -> usize {
        let started = {
            let mut state = self.shared.state.lock().await;
            let started = start_ready_tasks(&self.shared, &mut state);
            purge_completed(&self.shared, &mut state);
            started
        };
        let count = started.len();
        for (task_id, request, ctx) in started {
            spawn_execution(self.shared.clone(), task_id, request, ctx);
        }
        count
    }

    /// Drop completed tasks older than the cache life
    pub async fn purge_completed(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        purge_completed(&self.shared, &mut state)
    }

    /// Report the outcome of a running task
    pub async fn finish(&self, task_id: &TaskId, event: TaskEvent) -> bool {
        finish(&self.shared, task_id, event).await
    }

    /// Complete a running asynchronous task
    pub async fn complete_async(&self, task_id: &TaskId, event: TaskEvent) -> bool {
        let mut state = self.shared.state.lock().await;
        let is_async = state
            .running
            .iter()
            .any(|t| t.id() == task_id && t.request().asynchronous);
        if !is_async {
            tracing::warn!(%task_id, "no running asynchronous task to complete");
            return false;
        }
        match state.take_running(task_id) {
            Some(task) => {
                retire(&self.shared, &mut state, task, event);
                true
            }
            None => false,
        }
    }

    /// Cancel a task.
    ///
    /// `None` when the task is unknown or already complete, `Some(false)`
    /// when a running task has no cancel control hook or the hook failed.
    pub async fn cancel(&self, task_id: &TaskId) -> Option<bool> {
        let (request, report, flag) = {
            let mut state = self.shared.state.lock().await;
            if let Some(task) = state.take_waiting(task_id) {
                retire(&self.shared, &mut state, task, TaskEvent::Cancel);
                return Some(true);
            }
            let task = state.running.iter().find(|t| t.id() == task_id)?;
            (task.request().clone(), task.call_report(), task.canceled_flag())
        };

        let Some(hook) = self
            .shared
            .registry
            .control_hook(&request, ControlPoint::Cancel)
        else {
            tracing::info!(%task_id, "running task has no cancel control hook");
            return Some(false);
        };

        flag.store(true, Ordering::SeqCst);
        let outcome = tokio::task::spawn_blocking(move || {
            catch_unwind(AssertUnwindSafe(|| hook.fire(&request, &report)))
        })
        .await;

        match outcome {
            Ok(Ok(Ok(()))) => {
                let mut state = self.shared.state.lock().await;
                if let Some(task) = state.take_running(task_id) {
                    retire(&self.shared, &mut state, task, TaskEvent::Cancel);
                }
                Some(true)
            }
            Ok(Ok(Err(e))) => {
                flag.store(false, Ordering::SeqCst);
                tracing::warn!(%task_id, error = %e, "cancel control hook failed");
                Some(false)
            }
            Ok(Err(_)) | Err(_) => {
                flag.store(false, Ordering::SeqCst);
                tracing::error!(%task_id, "cancel control hook panicked");
                Some(false)
            }
        }
    }

    /// Replace a live task's progress report
    pub async fn report_progress(&self, task_id: &TaskId, progress: serde_json::Value) -> bool {
        let state = self.shared.state.lock().await;
        let updated = state
            .live()
            .find(|t| t.id() == task_id)
            .is_some_and(|t| t.set_progress(progress));
        updated
    }

    pub async fn call_report(&self, task_id: &TaskId) -> Option<CallReport> {
        let state = self.shared.state.lock().await;
        let report = state
            .all()
            .find(|t| t.id() == task_id)
            .map(Task::call_report);
        report
    }

    pub async fn handle(&self, task_id: &TaskId) -> Option<CallHandle> {
        let state = self.shared.state.lock().await;
        let handle = state.all().find(|t| t.id() == task_id).map(Task::handle);
        handle
    }

    /// Requests and reports of every task, completed ones first
    pub async fn snapshot(&self, include_completed: bool) -> Vec<(Arc<CallRequest>, CallReport)> {
        let state = self.shared.state.lock().await;
        let tasks: Box<dyn Iterator<Item = &Task> + '_> = if include_completed {
            Box::new(state.all())
        } else {
            Box::new(state.live())
        };
        tasks
            .map(|t| (t.request().clone(), t.call_report()))
            .collect()
    }

    pub async fn counts(&self) -> QueueCounts {
        let state = self.shared.state.lock().await;
        QueueCounts {
            waiting: state.waiting.len(),
            running: state.running.len(),
            completed: state.completed.len(),
            running_weight: state.running_weight,
        }
    }
}

/// Sizes of the queue's task lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub waiting: usize,
    pub running: usize,
    pub completed: usize,
    pub running_weight: u32,
}

/// Exclusive access to the queue for the duration of an admission.
/// Dropping the guard unlocks the queue.
pub struct AdmissionGuard<'a, C: Clock> {
    state: MutexGuard<'a, QueueState>,
    shared: &'a Shared<C>,
}

impl<C: Clock> AdmissionGuard<'_, C> {
    /// Add a task to the queue and journal its request.
    ///
    /// Dependencies on tasks that are no longer queued or running are
    /// dropped.
    pub fn enqueue(&mut self, mut task: Task) -> Result<(), StoreError> {
        let live: Vec<TaskId> = self.state.live().map(|t| t.id().clone()).collect();
        task.dependencies_mut().retain(|id, _| live.contains(id));

        let queued_at = self.shared.clock.now();
        self.shared.journal.save(QueuedCall {
            task_id: task.id().clone(),
            queued_at,
            request: (**task.request()).clone(),
        })?;
        task.mark_queued(queued_at);

        tracing::debug!(
            task_id = %task.id(),
            blocking = task.dependencies().len(),
            "enqueued"
        );
        fire(self.shared, &task, vec![Lifecycle::Enqueue]);
        self.state.waiting.push(task);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Remove a task that has not started yet. Running and finished tasks
    /// are left alone.
    pub fn dequeue(&mut self, task_id: &TaskId) -> Option<Task> {
        let task = self.state.take_waiting(task_id)?;
        forget(self.shared, &task);
        fire(self.shared, &task, vec![Lifecycle::Dequeue]);
        Some(task)
    }

    /// Cancel a dequeued task, releasing anything waiting on it
    pub fn cancel_dequeued(&mut self, task: Task) {
        retire(self.shared, &mut self.state, task, TaskEvent::Cancel);
    }

    /// Task id of the live task running `call_request_id`
    pub fn live_task_for_request(&self, call_request_id: &str) -> Option<TaskId> {
        self.state
            .live()
            .find(|t| t.request().id == call_request_id)
            .map(|t| t.id().clone())
    }

    pub fn state_of(&self, task_id: &TaskId) -> Option<TaskState> {
        self.state
            .all()
            .find(|t| t.id() == task_id)
            .and_then(Task::state)
    }
}

fn fire<C: Clock>(shared: &Shared<C>, task: &Task, points: Vec<Lifecycle>) {
    if points.is_empty() {
        return;
    }
    let firing = HookFiring {
        request: task.request().clone(),
        report: task.call_report(),
        points,
    };
    if shared.hooks_tx.send(firing).is_err() {
        tracing::warn!(task_id = %task.id(), "hook runner gone, dropping hooks");
    }
}

/// Remove the task's journal entry
fn forget<C: Clock>(shared: &Shared<C>, task: &Task) {
    if let Err(e) = shared.journal.remove(task.id()) {
        tracing::error!(task_id = %task.id(), error = %e, "failed to remove journaled call");
    }
}

/// Move a task to its terminal state and release its dependents.
///
/// Dependents whose accepted states do not include the finished state are
/// canceled in turn.
fn retire<C: Clock>(shared: &Shared<C>, state: &mut QueueState, task: Task, event: TaskEvent) {
    let mut pending = vec![(task, event)];

    while let Some((mut task, event)) = pending.pop() {
        let points = task.apply(event, &shared.clock);
        let Some(finished) = task.state().filter(TaskState::is_terminal) else {
            // Not a terminal transition; put it back where it belongs
            if task.state() == Some(TaskState::Running) {
                state.running_weight += task.weight();
                state.running.push(task);
            } else {
                state.waiting.push(task);
            }
            continue;
        };

        forget(shared, &task);
        fire(shared, &task, points);
        tracing::info!(task_id = %task.id(), state = %finished, "task complete");

        let mut idx = 0;
        while idx < state.waiting.len() {
            let accepted = state.waiting[idx].dependencies_mut().remove(task.id());
            match accepted {
                Some(states) if !states.contains(&finished) => {
                    let dependent = state.waiting.remove(idx);
                    tracing::info!(
                        task_id = %dependent.id(),
                        dependency = %task.id(),
                        dependency_state = %finished,
                        "dependency ended in an unaccepted state, canceling"
                    );
                    pending.push((dependent, TaskEvent::Cancel));
                }
                _ => idx += 1,
            }
        }

        state.completed.push(task);
    }
    shared.wake.notify_one();
}

fn purge_completed<C: Clock>(shared: &Shared<C>, state: &mut QueueState) -> usize {
    let Ok(life) = chrono::Duration::from_std(shared.config.completed_task_cache_life) else {
        return 0;
    };
    let now = shared.clock.now();
    let before = state.completed.len();
    state.completed.retain(|task| {
        task.call_report()
            .finish_time
            .map_or(true, |finished| now.signed_duration_since(finished) < life)
    });
    before - state.completed.len()
}

type Started = (TaskId, Arc<CallRequest>, CallContext);

/// Start every waiting task whose dependencies are clear and whose weight
/// fits. All waiting tasks are examined since some may weigh nothing.
fn start_ready_tasks<C: Clock>(shared: &Shared<C>, state: &mut QueueState) -> Vec<Started> {
    let mut available = shared
        .config
        .concurrency_threshold
        .saturating_sub(state.running_weight);

    let ready: Vec<TaskId> = state
        .waiting
        .iter()
        .filter(|task| task.is_ready())
        .filter(|task| {
            if task.weight() > available {
                return false;
            }
            available -= task.weight();
            true
        })
        .map(|task| task.id().clone())
        .collect();

    let mut started = Vec::new();
    for id in ready {
        let Some(mut task) = state.take_waiting(&id) else {
            continue;
        };
        let points = task.apply(TaskEvent::Start, &shared.clock);
        fire(shared, &task, points);
        state.running_weight += task.weight();

        let sink = task.report_sender();
        let ctx = CallContext::new(
            id.clone(),
            task.request().id.clone(),
            Arc::new(move |progress| {
                set_progress(&sink, progress);
            }),
            task.canceled_flag(),
        );
        tracing::info!(task_id = %id, task_type = %task.request().task_type, "running");
        started.push((id, task.request().clone(), ctx));
        state.running.push(task);
    }
    started
}

fn spawn_execution<C: Clock>(
    shared: Arc<Shared<C>>,
    task_id: TaskId,
    request: Arc<CallRequest>,
    ctx: CallContext,
) {
    tokio::spawn(async move {
        let Some(handler) = shared.registry.handler(&request.task_type) else {
            let exception = format!("no handler registered for task type: {}", request.task_type);
            tracing::error!(%task_id, "{exception}");
            finish(
                &shared,
                &task_id,
                TaskEvent::Fail {
                    exception,
                    traceback: None,
                },
            )
            .await;
            return;
        };

        let call = request.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            handler.call(&ctx, &call.args, &call.kwargs)
        })
        .await;

        let event = match outcome {
            Ok(Ok(_)) if request.asynchronous => {
                tracing::debug!(%task_id, "asynchronous call dispatched, awaiting completion");
                return;
            }
            Ok(Ok(result)) => TaskEvent::Succeed { result },
            Ok(Err(CallError::Canceled)) => TaskEvent::Cancel,
            Ok(Err(CallError::Failed { message, traceback })) => {
                tracing::warn!(%task_id, error = %message, "call failed");
                TaskEvent::Fail {
                    exception: message,
                    traceback,
                }
            }
            Err(e) => {
                tracing::warn!(%task_id, error = %e, "handler panicked");
                TaskEvent::Fail {
                    exception: format!("handler panicked: {e}"),
                    traceback: None,
                }
            }
        };
        finish(&shared, &task_id, event).await;
    });
}

async fn finish<C: Clock>(shared: &Shared<C>, task_id: &TaskId, event: TaskEvent) -> bool {
    let mut state = shared.state.lock().await;
    match state.take_running(task_id) {
        Some(task) => {
            retire(shared, &mut state, task, event);
            true
        }
        // Canceled while the handler was still running
        None => false,
    }
}

async fn dispatch_loop<C: Clock>(shared: Arc<Shared<C>>) {
    let mut shutdown = shared.shutdown.subscribe();
    let queue = TaskQueue {
        shared: shared.clone(),
    };
    loop {
        tokio::select! {
            _ = shared.wake.notified() => {}
            _ = tokio::time::sleep(shared.config.dispatch_interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }
        queue.dispatch().await;
    }
    tracing::debug!("dispatcher exiting");
}

fn run_hooks(registry: Arc<Registry>, mut rx: mpsc::UnboundedReceiver<HookFiring>) {
    while let Some(firing) = rx.blocking_recv() {
        for point in firing.points {
            for (name, hook) in registry.execution_hooks(&firing.request, point) {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| hook.fire(&firing.request, &firing.report)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(
                        hook = %name,
                        call_request_id = %firing.request.id,
                        error = %e,
                        "execution hook failed"
                    ),
                    Err(_) => tracing::error!(
                        hook = %name,
                        call_request_id = %firing.request.id,
                        "execution hook panicked"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
