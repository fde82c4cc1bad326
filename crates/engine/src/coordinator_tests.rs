// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::{test_config, test_registry, Gate, Trail};
use dispatch_core::{
    classify, CallReport, Conflict, ConflictReason, FakeClock, Operation, ResourceKey,
    ResourceType, SequentialIdGen, TaskState,
};
use dispatch_storage::{MaterializedState, QueuedCall, StoreError, TaskResource, Wal};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

type TestCoordinator = Coordinator<FakeClock, SequentialIdGen>;

struct Fixture {
    coordinator: TestCoordinator,
    ledger: MemoryLedger,
    journal: MemoryJournal,
    ran: Trail,
    gate: Gate,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.gate.open();
    }
}

fn coordinator_over(
    ledger: Arc<dyn LedgerStore>,
    journal: MemoryJournal,
    ran: &Trail,
    gate: &Gate,
) -> TestCoordinator {
    let deps = CoordinatorDeps {
        registry: Arc::new(test_registry(ran, gate)),
        ledger,
        journal: Arc::new(journal),
    };
    Coordinator::new(deps, test_config(), FakeClock::new(), SequentialIdGen::new("task"))
}

fn fixture() -> Fixture {
    let ledger = MemoryLedger::new();
    let journal = MemoryJournal::new();
    let ran = Trail::default();
    let gate = Gate::default();
    let coordinator = coordinator_over(Arc::new(ledger.clone()), journal.clone(), &ran, &gate);
    Fixture {
        coordinator,
        ledger,
        journal,
        ran,
        gate,
    }
}

fn repo_op(task_type: &str, label: &str, op: Operation) -> CallRequest {
    let mut request = CallRequest::new(task_type).with_arg(label);
    request
        .resources
        .insert(ResourceType::Repository, "zoo", op);
    request
}

async fn submit_async(fx: &Fixture, request: CallRequest) -> CallHandle {
    fx.coordinator
        .submit(request, SubmitMode::Asynchronous)
        .await
        .unwrap()
}

async fn complete(handle: &CallHandle) -> CallReport {
    tokio::time::timeout(Duration::from_secs(5), handle.wait_until_complete())
        .await
        .unwrap()
}

fn ledger_tasks(ledger: &MemoryLedger) -> Vec<TaskId> {
    ledger
        .entries()
        .unwrap()
        .into_iter()
        .map(|row| row.task_id)
        .collect()
}

// =============================================================================
// Admission scenarios
// =============================================================================

#[tokio::test]
async fn read_behind_delete_is_rejected_without_ledger_change() {
    let fx = fixture();
    let deleter = submit_async(&fx, repo_op("gated", "t1", Operation::Delete)).await;
    let reader = submit_async(&fx, repo_op("record", "t2", Operation::Read)).await;

    let report = reader.report();
    assert_eq!(report.response, CallResponse::Rejected);
    assert_eq!(report.state, None);
    assert_eq!(report.task_id, None);
    assert_eq!(
        report.reasons,
        vec![ConflictReason {
            resource_type: ResourceType::Repository,
            resource_id: "zoo".to_string(),
            operation: Operation::Delete,
            task_id: TaskId::from("task-1"),
        }]
    );
    assert_eq!(deleter.task_id(), Some(&TaskId::from("task-1")));
    assert_eq!(ledger_tasks(&fx.ledger), vec![TaskId::from("task-1")]);
    assert_eq!(fx.journal.len(), 1);
}

#[tokio::test]
async fn update_behind_update_is_postponed_until_holder_finishes() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    let first = submit_async(&fx, repo_op("gated", "t1", Operation::Update)).await;
    first.wait_until_running().await;

    let second = submit_async(&fx, repo_op("record", "t2", Operation::Update)).await;
    let report = second.report();
    assert_eq!(report.response, CallResponse::Postponed);
    assert_eq!(report.reasons.len(), 1);
    assert_eq!(report.reasons[0].task_id, TaskId::from("task-1"));
    assert_eq!(report.reasons[0].operation, Operation::Update);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(second.report().state, Some(TaskState::Waiting));
    assert_eq!(fx.ran.entries(), vec!["t1"]);

    fx.gate.open();
    assert_eq!(complete(&first).await.state, Some(TaskState::Succeeded));
    assert_eq!(complete(&second).await.state, Some(TaskState::Succeeded));
    assert_eq!(fx.ran.entries(), vec!["t1", "t2"]);
    assert!(fx.ledger.is_empty());
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn concurrent_reads_are_both_accepted() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    let a = submit_async(&fx, repo_op("gated", "a", Operation::Read)).await;
    let b = submit_async(&fx, repo_op("gated", "b", Operation::Read)).await;

    assert_eq!(a.response(), CallResponse::Accepted);
    assert_eq!(b.response(), CallResponse::Accepted);
    assert!(b.report().reasons.is_empty());
    a.wait_until_running().await;
    b.wait_until_running().await;
    assert_eq!(fx.ledger.len(), 2);

    fx.gate.open();
    complete(&a).await;
    complete(&b).await;
    assert!(fx.ledger.is_empty());
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn ledger_rows_are_released_on_every_terminal_state() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();

    let mut failing = CallRequest::new("fail");
    failing
        .resources
        .insert(ResourceType::Consumer, "c1", Operation::Update);
    let failed = submit_async(&fx, failing).await;
    assert_eq!(complete(&failed).await.state, Some(TaskState::Failed));

    fx.coordinator.stop(false).await.unwrap();
    let waiting = submit_async(&fx, repo_op("record", "x", Operation::Update)).await;
    assert_eq!(fx.ledger.len(), 1);
    let task_id = waiting.task_id().cloned().unwrap();
    assert_eq!(fx.coordinator.cancel_call(&task_id).await, Some(true));
    assert_eq!(waiting.report().state, Some(TaskState::Canceled));
    assert!(fx.ledger.is_empty());
    assert!(fx.journal.is_empty());
}

#[tokio::test]
async fn rejected_call_reports_are_not_retained() {
    let fx = fixture();
    submit_async(&fx, repo_op("gated", "t1", Operation::Delete)).await;
    let rejected = submit_async(&fx, repo_op("record", "t2", Operation::Delete)).await;
    assert_eq!(rejected.response(), CallResponse::Rejected);

    let reports = fx.coordinator.find_call_reports(&CallCriteria::new()).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].task_id, Some(TaskId::from("task-1")));
}

// =============================================================================
// Submission modes
// =============================================================================

#[tokio::test]
async fn default_mode_waits_for_accepted_call() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();

    let handle = fx
        .coordinator
        .submit(repo_op("record", "now", Operation::Create), SubmitMode::Default)
        .await
        .unwrap();
    let report = handle.report();
    assert_eq!(report.state, Some(TaskState::Succeeded));
    assert_eq!(report.result, Some(json!("now")));
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn default_mode_returns_postponed_call_immediately() {
    let fx = fixture();
    submit_async(&fx, repo_op("gated", "t1", Operation::Update)).await;

    let handle = fx
        .coordinator
        .submit(repo_op("record", "t2", Operation::Update), SubmitMode::Default)
        .await
        .unwrap();
    assert_eq!(handle.response(), CallResponse::Postponed);
    assert_eq!(handle.report().state, Some(TaskState::Waiting));
}

#[tokio::test]
async fn synchronous_timeout_dequeues_the_task() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    let holder = submit_async(&fx, repo_op("gated", "holder", Operation::Update)).await;
    holder.wait_until_running().await;

    let err = fx
        .coordinator
        .submit(
            repo_op("record", "late", Operation::Update),
            SubmitMode::Synchronous {
                timeout: Some(Duration::from_millis(100)),
            },
        )
        .await
        .unwrap_err();
    let DispatchError::SynchronousCallTimeout { task_id, timeout } = err else {
        panic!("expected a timeout, got {err}");
    };
    assert_eq!(task_id, TaskId::from("task-2"));
    assert_eq!(timeout, Duration::from_millis(100));
    assert_eq!(ledger_tasks(&fx.ledger), vec![TaskId::from("task-1")]);

    fx.gate.open();
    complete(&holder).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.ran.entries(), vec!["holder"]);
    let report = fx.coordinator.call_report(&task_id).await.unwrap();
    assert_eq!(report.state, Some(TaskState::Canceled));
    assert_eq!(report.start_time, None);
    assert!(fx.ledger.is_empty());
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn synchronous_mode_waits_through_postponement() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    submit_async(&fx, repo_op("gated", "holder", Operation::Update)).await;

    let gate = fx.gate.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        gate.open();
    });
    let handle = fx
        .coordinator
        .submit(
            repo_op("record", "next", Operation::Update),
            SubmitMode::Synchronous {
                timeout: Some(Duration::from_secs(5)),
            },
        )
        .await
        .unwrap();

    assert_eq!(handle.response(), CallResponse::Postponed);
    assert_eq!(handle.report().state, Some(TaskState::Succeeded));
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn synchronous_mode_refuses_asynchronous_requests() {
    let fx = fixture();
    let request = CallRequest::new("noop").asynchronous();
    let request_id = request.id.clone();

    let err = fx
        .coordinator
        .submit(request, SubmitMode::Synchronous { timeout: None })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AsynchronousExecution(id) if id == request_id));
    assert!(fx.ledger.is_empty());
}

#[tokio::test]
async fn unknown_task_type_is_refused_before_admission() {
    let fx = fixture();
    let err = fx
        .coordinator
        .submit(CallRequest::new("repo.sync"), SubmitMode::Asynchronous)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no handler registered for task type: repo.sync");
    assert!(fx.journal.is_empty());
}

#[tokio::test]
async fn asynchronous_call_completes_externally() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    let request = CallRequest::new("noop")
        .asynchronous()
        .updates_resource(ResourceType::Repository, "zoo");

    let handle = fx
        .coordinator
        .submit(request, SubmitMode::Default)
        .await
        .unwrap();
    let task_id = handle.task_id().cloned().unwrap();
    handle.wait_until_running().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.report().state, Some(TaskState::Running));
    assert_eq!(fx.ledger.len(), 1);

    assert!(fx.coordinator.report_call_progress(&task_id, json!({"pct": 50})).await);
    assert!(
        fx.coordinator
            .complete_call_failure(&task_id, "remote agent died", None)
            .await
    );
    let report = handle.report();
    assert_eq!(report.state, Some(TaskState::Failed));
    assert_eq!(report.exception.as_deref(), Some("remote agent died"));
    assert_eq!(report.progress, json!({"pct": 50}));
    assert!(fx.ledger.is_empty());
    assert!(!fx.coordinator.complete_call_success(&task_id, json!(1)).await);
    fx.coordinator.stop(false).await.unwrap();
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn job_members_share_a_job_id_and_are_decided_independently() {
    let fx = fixture();
    let mut consumer = CallRequest::new("record").with_arg("bind");
    consumer
        .resources
        .insert(ResourceType::Consumer, "c1", Operation::Update);
    let requests = vec![
        repo_op("record", "sync", Operation::Update),
        consumer,
        CallRequest::new("record").with_arg("free"),
    ];

    let job = fx.coordinator.submit_job(requests).await.unwrap();

    assert_eq!(job.job_id, "task-1");
    assert_eq!(job.calls.len(), 3);
    assert!(job.all_admitted());
    for call in &job.calls {
        let report = call.report();
        assert_eq!(report.response, CallResponse::Accepted);
        assert_eq!(report.job_id.as_deref(), Some("task-1"));
        assert!(report.tags.contains(&"job:task-1".to_string()));
    }
    let found = fx
        .coordinator
        .find_call_reports(&CallCriteria::new().job_id("task-1"))
        .await;
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn job_member_conflicting_with_sibling_is_rejected_alone() {
    let fx = fixture();
    let requests = vec![
        repo_op("record", "delete", Operation::Delete),
        repo_op("record", "read", Operation::Read),
        CallRequest::new("record").with_arg("free"),
    ];

    let job = fx.coordinator.submit_job(requests).await.unwrap();
    let responses: Vec<_> = job.calls.iter().map(CallHandle::response).collect();
    assert_eq!(
        responses,
        vec![
            CallResponse::Accepted,
            CallResponse::Rejected,
            CallResponse::Accepted
        ]
    );
    assert!(!job.all_admitted());
}

#[tokio::test]
async fn job_members_run_in_dependency_order() {
    let fx = fixture();
    let sync = CallRequest::new("record").with_arg("sync");
    let publish = CallRequest::new("record")
        .with_arg("publish")
        .depends_on(sync.id.clone(), [TaskState::Succeeded]);
    let publish_id = publish.id.clone();
    fx.coordinator.start().await.unwrap();
    let job = fx.coordinator.submit_job(vec![publish, sync]).await.unwrap();

    // Handles keep submission order even though sync was admitted first
    assert_eq!(job.calls[0].report().call_request_id, publish_id);
    assert_eq!(job.calls[0].task_id(), Some(&TaskId::from("task-3")));
    complete(&job.calls[0]).await;
    complete(&job.calls[1]).await;
    assert_eq!(fx.ran.entries(), vec!["sync", "publish"]);
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn failed_dependency_cancels_job_member() {
    let fx = fixture();
    let fetch = CallRequest::new("fail");
    let import = CallRequest::new("record")
        .with_arg("import")
        .depends_on(fetch.id.clone(), [TaskState::Succeeded]);
    fx.coordinator.start().await.unwrap();
    let job = fx.coordinator.submit_job(vec![fetch, import]).await.unwrap();

    assert_eq!(complete(&job.calls[0]).await.state, Some(TaskState::Failed));
    assert_eq!(complete(&job.calls[1]).await.state, Some(TaskState::Canceled));
    assert!(fx.ran.entries().is_empty());
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn dependency_cycle_fails_job_before_admission() {
    let fx = fixture();
    let mut a = CallRequest::new("noop");
    let mut b = CallRequest::new("noop");
    a = a.depends_on(b.id.clone(), TaskState::TERMINAL);
    b = b.depends_on(a.id.clone(), TaskState::TERMINAL);
    a.resources.insert(ResourceType::Repository, "zoo", Operation::Update);

    let err = fx.coordinator.submit_job(vec![a, b]).await.unwrap_err();
    assert!(matches!(err, DispatchError::DependencyCycle(ref ids) if ids.len() == 2));
    assert!(fx.ledger.is_empty());
    assert!(fx.journal.is_empty());
}

#[tokio::test]
async fn cancel_multiple_calls_cancels_live_members() {
    let fx = fixture();
    let job = fx
        .coordinator
        .submit_job(vec![
            repo_op("record", "a", Operation::Update),
            repo_op("record", "b", Operation::Update),
        ])
        .await
        .unwrap();
    assert_eq!(job.calls[1].response(), CallResponse::Postponed);

    let outcomes = fx.coordinator.cancel_multiple_calls(&job.job_id).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.values().all(|o| *o == Some(true)));
    assert!(fx.ledger.is_empty());
    assert!(fx
        .coordinator
        .cancel_multiple_calls(&job.job_id)
        .await
        .is_empty());
}

// =============================================================================
// Storage failure and recovery
// =============================================================================

/// Ledger whose inserts fail while `down` is set
#[derive(Clone, Default)]
struct FlakyLedger {
    inner: MemoryLedger,
    down: Arc<AtomicBool>,
}

impl LedgerStore for FlakyLedger {
    fn insert(&self, rows: Vec<TaskResource>) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger offline".to_string()));
        }
        self.inner.insert(rows)
    }

    fn find(&self, keys: &[ResourceKey]) -> Result<Vec<TaskResource>, StoreError> {
        self.inner.find(keys)
    }

    fn remove(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        self.inner.remove(task_id)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        self.inner.clear()
    }

    fn entries(&self) -> Result<Vec<TaskResource>, StoreError> {
        self.inner.entries()
    }
}

#[tokio::test]
async fn ledger_failure_fails_submission_without_partial_rows() {
    let flaky = FlakyLedger::default();
    let journal = MemoryJournal::new();
    let coordinator = coordinator_over(
        Arc::new(flaky.clone()),
        journal.clone(),
        &Trail::default(),
        &Gate::default(),
    );
    flaky.down.store(true, Ordering::SeqCst);

    let request = CallRequest::new("noop")
        .updates_resource(ResourceType::Repository, "zoo")
        .reads_resource(ResourceType::Consumer, "c1");
    let err = coordinator
        .submit(request, SubmitMode::Asynchronous)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Storage(StoreError::Unavailable(_))));
    assert!(flaky.inner.is_empty());
    assert!(journal.is_empty());
    assert_eq!(coordinator.counts().await.waiting, 0);

    flaky.down.store(false, Ordering::SeqCst);
    let request = CallRequest::new("noop").updates_resource(ResourceType::Repository, "zoo");
    let handle = coordinator
        .submit(request, SubmitMode::Asynchronous)
        .await
        .unwrap();
    assert_eq!(handle.response(), CallResponse::Accepted);
}

#[tokio::test]
async fn start_recovers_interrupted_calls() {
    let ledger = MemoryLedger::new();
    let journal = MemoryJournal::new();
    let ran = Trail::default();
    let gate = Gate::default();

    // A previous run admitted work and died before running it
    let previous = coordinator_over(Arc::new(ledger.clone()), journal.clone(), &ran, &gate);
    previous
        .submit(repo_op("record", "lone", Operation::Update), SubmitMode::Asynchronous)
        .await
        .unwrap();
    previous
        .submit_job(vec![
            CallRequest::new("record").with_arg("member-1"),
            CallRequest::new("record").with_arg("member-2"),
        ])
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(journal.len(), 3);

    let coordinator = coordinator_over(Arc::new(ledger.clone()), journal.clone(), &ran, &gate);
    let recovery = coordinator.start().await.unwrap();
    assert_eq!(
        recovery,
        Recovery {
            ledger_rows_dropped: 1,
            resubmitted: 3,
            skipped: 0,
        }
    );

    let mut reports = Vec::new();
    for handle in [&TaskId::from("task-1"), &TaskId::from("task-3"), &TaskId::from("task-4")] {
        let handle = coordinator.handle(handle).await.unwrap();
        reports.push(complete(&handle).await);
    }
    assert!(reports.iter().all(|r| r.state == Some(TaskState::Succeeded)));
    // Job members were regrouped under a fresh job id
    assert_eq!(reports[1].job_id.as_deref(), Some("task-2"));
    assert_eq!(reports[2].job_id.as_deref(), Some("task-2"));
    let mut ran = ran.entries();
    ran.sort();
    assert_eq!(ran, vec!["lone", "member-1", "member-2"]);
    assert!(ledger.is_empty());
    assert!(journal.is_empty());
    coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn start_skips_unrunnable_journaled_calls() {
    let ledger = MemoryLedger::new();
    let journal = MemoryJournal::new();
    journal
        .save(QueuedCall {
            task_id: TaskId::from("old-1"),
            queued_at: chrono::Utc::now(),
            request: CallRequest::new("retired.handler"),
        })
        .unwrap();

    let coordinator = coordinator_over(
        Arc::new(ledger),
        journal.clone(),
        &Trail::default(),
        &Gate::default(),
    );
    let recovery = coordinator.start().await.unwrap();
    assert_eq!(recovery.skipped, 1);
    assert_eq!(recovery.resubmitted, 0);
    assert!(journal.is_empty());
    coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn durable_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.wal");
    let store = WalStore::open(&path).unwrap();
    let ran = Trail::default();
    let gate = Gate::default();
    let durable = |store: WalStore| {
        Coordinator::new(
            CoordinatorDeps::durable(test_registry(&ran, &gate), store),
            test_config(),
            FakeClock::new(),
            SequentialIdGen::new("task"),
        )
    };

    let previous = durable(store.clone());
    previous
        .submit(repo_op("record", "lone", Operation::Delete), SubmitMode::Asynchronous)
        .await
        .unwrap();
    drop(previous);

    let on_disk = MaterializedState::from_ops(&Wal::replay(&path).unwrap());
    assert_eq!(on_disk.ledger.len(), 1);
    assert_eq!(on_disk.calls.len(), 1);

    let coordinator = durable(store);
    let recovery = coordinator.start().await.unwrap();
    assert_eq!(recovery.resubmitted, 1);
    let handle = coordinator.handle(&TaskId::from("task-1")).await.unwrap();
    assert_eq!(complete(&handle).await.state, Some(TaskState::Succeeded));
    assert_eq!(ran.entries(), vec!["lone"]);

    let on_disk = MaterializedState::from_ops(&Wal::replay(&path).unwrap());
    assert!(on_disk.ledger.is_empty());
    assert!(on_disk.calls.is_empty());
    coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn stop_can_clear_queued_calls() {
    let fx = fixture();
    submit_async(&fx, CallRequest::new("noop")).await;
    assert_eq!(fx.journal.len(), 1);

    fx.coordinator.stop(true).await.unwrap();
    assert!(fx.journal.is_empty());
}

#[tokio::test]
async fn second_start_is_refused_and_keeps_live_claims() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    let holder = submit_async(&fx, repo_op("gated", "holder", Operation::Delete)).await;
    holder.wait_until_running().await;

    let again = fx.coordinator.start().await;
    assert!(matches!(again, Err(DispatchError::AlreadyStarted)));
    assert_eq!(ledger_tasks(&fx.ledger), vec![TaskId::from("task-1")]);
    assert_eq!(fx.journal.len(), 1);

    let reader = submit_async(&fx, repo_op("noop", "reader", Operation::Read)).await;
    assert_eq!(reader.response(), CallResponse::Rejected);

    fx.gate.open();
    assert_eq!(complete(&holder).await.state, Some(TaskState::Succeeded));
    fx.coordinator.stop(false).await.unwrap();
}

#[tokio::test]
async fn restart_after_stop_resumes_dispatch() {
    let fx = fixture();
    fx.coordinator.start().await.unwrap();
    fx.coordinator.stop(false).await.unwrap();

    let parked = submit_async(&fx, repo_op("record", "parked", Operation::Update)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(parked.report().state, Some(TaskState::Waiting));

    let recovery = fx.coordinator.start().await.unwrap();
    assert_eq!(recovery, Recovery::default());
    assert_eq!(complete(&parked).await.state, Some(TaskState::Succeeded));

    let later = fx
        .coordinator
        .submit(CallRequest::new("record").with_arg("later"), SubmitMode::Default)
        .await
        .unwrap();
    assert_eq!(complete(&later).await.state, Some(TaskState::Succeeded));
    assert_eq!(fx.ran.entries(), vec!["parked", "later"]);
    assert!(fx.ledger.is_empty());
    fx.coordinator.stop(false).await.unwrap();
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn reports_are_found_by_call_request_id() {
    let fx = fixture();
    let a = CallRequest::new("noop").with_tag("repo:zoo");
    let b = CallRequest::new("noop");
    let ids = vec![a.id.clone(), b.id.clone()];
    submit_async(&fx, a).await;
    submit_async(&fx, b).await;

    let reports = fx
        .coordinator
        .get_call_reports_by_call_request_ids(&ids[..1], false)
        .await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].call_request_id, ids[0]);

    let tagged = fx
        .coordinator
        .find_call_reports(&CallCriteria::new().tag("repo:zoo").state(TaskState::Waiting))
        .await;
    assert_eq!(tagged.len(), 1);
    assert_eq!(
        fx.coordinator
            .get_call_reports_by_call_request_ids(&ids, true)
            .await
            .len(),
        2
    );
}

// =============================================================================
// Matrix through the coordinator
// =============================================================================

use yare::parameterized;

#[parameterized(
    create_create = { Operation::Create, Operation::Create },
    create_read = { Operation::Create, Operation::Read },
    create_update = { Operation::Create, Operation::Update },
    create_delete = { Operation::Create, Operation::Delete },
    read_create = { Operation::Read, Operation::Create },
    read_read = { Operation::Read, Operation::Read },
    read_update = { Operation::Read, Operation::Update },
    read_delete = { Operation::Read, Operation::Delete },
    update_create = { Operation::Update, Operation::Create },
    update_read = { Operation::Update, Operation::Read },
    update_update = { Operation::Update, Operation::Update },
    update_delete = { Operation::Update, Operation::Delete },
    delete_create = { Operation::Delete, Operation::Create },
    delete_read = { Operation::Delete, Operation::Read },
    delete_update = { Operation::Delete, Operation::Update },
    delete_delete = { Operation::Delete, Operation::Delete },
)]
fn second_call_follows_the_matrix(held: Operation, proposed: Operation) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let fx = fixture();
        submit_async(&fx, repo_op("noop", "held", held)).await;
        let second = submit_async(&fx, repo_op("noop", "proposed", proposed)).await;
        let report = second.report();

        match classify(held, proposed) {
            Conflict::Reject => {
                assert_eq!(report.response, CallResponse::Rejected);
                assert_eq!(fx.ledger.len(), 1);
            }
            Conflict::Postpone => {
                assert_eq!(report.response, CallResponse::Postponed);
                assert_eq!(report.reasons[0].task_id, TaskId::from("task-1"));
                assert_eq!(fx.ledger.len(), 2);
            }
            Conflict::None => {
                assert_eq!(report.response, CallResponse::Accepted);
                assert!(report.reasons.is_empty());
                assert_eq!(fx.ledger.len(), 2);
            }
        }
    });
}
