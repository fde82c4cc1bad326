// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests

use dispatch_core::{CallContext, CallError, CallReport, CallRequest, QueueConfig, Registry};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Blocks handlers until opened
#[derive(Clone, Default)]
pub(crate) struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub(crate) fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Wait for the gate, giving up after a few seconds so a broken test
    /// fails instead of hanging
    pub(crate) fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let _unused = cvar
            .wait_timeout_while(guard, Duration::from_secs(5), |open| !*open)
            .unwrap();
    }
}

/// Ordered record of what handlers and hooks saw
#[derive(Clone, Default)]
pub(crate) struct Trail {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trail {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

pub(crate) fn test_config() -> QueueConfig {
    QueueConfig {
        concurrency_threshold: 4,
        dispatch_interval: Duration::from_millis(10),
        completed_task_cache_life: Duration::from_secs(60),
    }
}

type HandlerResult = Result<Value, CallError>;

fn noop(_: &CallContext, _: &[Value], _: &Map<String, Value>) -> HandlerResult {
    Ok(Value::Null)
}

fn fail(_: &CallContext, _: &[Value], _: &Map<String, Value>) -> HandlerResult {
    Err(CallError::Failed {
        message: "feed unreachable".to_string(),
        traceback: Some("at fetch()".to_string()),
    })
}

fn progress(ctx: &CallContext, _: &[Value], _: &Map<String, Value>) -> HandlerResult {
    ctx.report_progress(json!({"step": "fetched"}));
    Ok(json!(1))
}

fn first_arg(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or(Value::Null)
}

/// Registry with the handlers tests use:
/// - `noop` returns null
/// - `record` appends its first argument to `ran` and returns it
/// - `gated` records, waits on `gate`, then returns "done"
/// - `fail` returns an error
/// - `progress` reports progress before returning
pub(crate) fn test_registry(ran: &Trail, gate: &Gate) -> Registry {
    let record_ran = ran.clone();
    let gated_ran = ran.clone();
    let gate = gate.clone();
    Registry::new()
        .with_handler("noop", noop)
        .with_handler("fail", fail)
        .with_handler("progress", progress)
        .with_handler(
            "record",
            move |_: &CallContext, args: &[Value], _: &Map<String, Value>| -> HandlerResult {
                let arg = first_arg(args);
                record_ran.push(arg.as_str().unwrap_or_default());
                Ok(arg)
            },
        )
        .with_handler(
            "gated",
            move |_: &CallContext, args: &[Value], _: &Map<String, Value>| -> HandlerResult {
                gated_ran.push(first_arg(args).as_str().unwrap_or_default());
                gate.wait();
                Ok(json!("done"))
            },
        )
}

/// Hook that records `<name>:<task_type>` for each firing
pub(crate) fn recording_hook(
    log: &Trail,
    name: &'static str,
) -> impl Fn(&CallRequest, &CallReport) -> Result<(), CallError> + Send + Sync + 'static {
    let log = log.clone();
    move |request: &CallRequest, _: &CallReport| -> Result<(), CallError> {
        log.push(format!("{name}:{}", request.task_type));
        Ok(())
    }
}

/// Poll `check` until it holds or a few seconds pass
pub(crate) async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
