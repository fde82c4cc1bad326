// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler and hook registry
//!
//! Requests name their callable (`task_type`) and hooks instead of carrying
//! closures. The registry maps those names to code when a task runs.

use crate::call::{CallReport, CallRequest, ControlPoint, Lifecycle};
use crate::task::TaskId;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a handler or a control hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("{message}")]
    Failed {
        message: String,
        traceback: Option<String>,
    },
    #[error("call was canceled")]
    Canceled,
}

impl CallError {
    pub fn failed(message: impl Into<String>) -> Self {
        CallError::Failed {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn traceback(&self) -> Option<&str> {
        match self {
            CallError::Failed { traceback, .. } => traceback.as_deref(),
            CallError::Canceled => None,
        }
    }
}

/// Errors resolving names against the registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no handler registered for task type: {0}")]
    UnknownTaskType(String),
    #[error("no hook registered under name: {0}")]
    UnknownHook(String),
}

/// What a running handler may see and do besides its arguments
#[derive(Clone)]
pub struct CallContext {
    task_id: TaskId,
    call_request_id: String,
    progress: Arc<dyn Fn(Value) + Send + Sync>,
    canceled: Arc<AtomicBool>,
}

impl CallContext {
    pub fn new(
        task_id: TaskId,
        call_request_id: impl Into<String>,
        progress: Arc<dyn Fn(Value) + Send + Sync>,
        canceled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            task_id,
            call_request_id: call_request_id.into(),
            progress,
            canceled,
        }
    }

    /// Context that discards progress, for tests and dry runs
    pub fn detached(task_id: TaskId) -> Self {
        Self::new(
            task_id,
            String::new(),
            Arc::new(|_| {}),
            Arc::new(AtomicBool::new(false)),
        )
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn call_request_id(&self) -> &str {
        &self.call_request_id
    }

    /// Replace the progress report on the task's call report
    pub fn report_progress(&self, progress: Value) {
        (self.progress)(progress);
    }

    /// Set once a cancel control hook has been invoked for this task
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("task_id", &self.task_id)
            .field("call_request_id", &self.call_request_id)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// The code behind a task type
pub trait Handler: Send + Sync {
    fn call(
        &self,
        ctx: &CallContext,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, CallError>;
}

impl<F> Handler for F
where
    F: Fn(&CallContext, &[Value], &Map<String, Value>) -> Result<Value, CallError> + Send + Sync,
{
    fn call(
        &self,
        ctx: &CallContext,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, CallError> {
        self(ctx, args, kwargs)
    }
}

/// A named callback fired at a lifecycle or control point
pub trait Hook: Send + Sync {
    fn fire(&self, request: &CallRequest, report: &CallReport) -> Result<(), CallError>;
}

impl<F> Hook for F
where
    F: Fn(&CallRequest, &CallReport) -> Result<(), CallError> + Send + Sync,
{
    fn fire(&self, request: &CallRequest, report: &CallReport) -> Result<(), CallError> {
        self(request, report)
    }
}

/// Name-to-code mapping for handlers and hooks
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    hooks: HashMap<String, Arc<dyn Hook>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, task_type: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(task_type.into(), Arc::new(handler));
    }

    pub fn with_handler(mut self, task_type: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.register_handler(task_type, handler);
        self
    }

    pub fn register_hook(&mut self, name: impl Into<String>, hook: impl Hook + 'static) {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn with_hook(mut self, name: impl Into<String>, hook: impl Hook + 'static) -> Self {
        self.register_hook(name, hook);
        self
    }

    pub fn handler(&self, task_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn hook(&self, name: &str) -> Option<Arc<dyn Hook>> {
        self.hooks.get(name).cloned()
    }

    /// Hooks subscribed to `point`, in subscription order, skipping unknown names
    pub fn execution_hooks(&self, request: &CallRequest, point: Lifecycle) -> Vec<(String, Arc<dyn Hook>)> {
        request
            .hooks_for(point)
            .iter()
            .filter_map(|name| self.hook(name).map(|hook| (name.clone(), hook)))
            .collect()
    }

    pub fn control_hook(&self, request: &CallRequest, point: ControlPoint) -> Option<Arc<dyn Hook>> {
        request
            .control_hooks
            .get(&point)
            .and_then(|name| self.hook(name))
    }

    /// Check that every name a request refers to resolves
    pub fn validate(&self, request: &CallRequest) -> Result<(), RegistryError> {
        if !self.handlers.contains_key(&request.task_type) {
            return Err(RegistryError::UnknownTaskType(request.task_type.clone()));
        }
        let hook_names = request
            .execution_hooks
            .values()
            .flatten()
            .chain(request.control_hooks.values());
        for name in hook_names {
            if !self.hooks.contains_key(name) {
                return Err(RegistryError::UnknownHook(name.clone()));
            }
        }
        Ok(())
    }

    pub fn task_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.task_types())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
