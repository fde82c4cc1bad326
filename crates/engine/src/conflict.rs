// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission: conflict detection against the resource ledger

use dispatch_core::{classify, CallResponse, Conflict, ConflictReason, Resources, TaskId};
use dispatch_storage::{LedgerStore, StoreError, TaskResource};
use std::collections::BTreeSet;

/// Outcome of conflict detection for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub response: CallResponse,
    /// Tasks that must finish before the request may run
    pub blocking: BTreeSet<TaskId>,
    pub reasons: Vec<ConflictReason>,
}

impl Admission {
    fn accepted() -> Self {
        Self {
            response: CallResponse::Accepted,
            blocking: BTreeSet::new(),
            reasons: Vec::new(),
        }
    }
}

/// Compare the proposed operations against every matching ledger row.
///
/// All conflicts are collected. Any rejecting holder makes the request
/// rejected and its postponing reasons are not reported.
pub fn find_conflicts(
    ledger: &dyn LedgerStore,
    resources: &Resources,
) -> Result<Admission, StoreError> {
    if resources.is_empty() {
        return Ok(Admission::accepted());
    }

    let held = ledger.find(&resources.keys())?;

    let mut rejecting = BTreeSet::new();
    let mut rejecting_reasons = BTreeSet::new();
    let mut postponing = BTreeSet::new();
    let mut postponing_reasons = BTreeSet::new();

    for row in &held {
        let Some(proposed) = resources.get(row.resource_type, &row.resource_id) else {
            continue;
        };
        for &held_op in &row.operations {
            let reason = || ConflictReason {
                resource_type: row.resource_type,
                resource_id: row.resource_id.clone(),
                operation: held_op,
                task_id: row.task_id.clone(),
            };
            match classify(held_op, proposed) {
                Conflict::Reject => {
                    rejecting.insert(row.task_id.clone());
                    rejecting_reasons.insert(reason());
                }
                Conflict::Postpone => {
                    postponing.insert(row.task_id.clone());
                    postponing_reasons.insert(reason());
                }
                Conflict::None => {}
            }
        }
    }

    let admission = if !rejecting.is_empty() {
        Admission {
            response: CallResponse::Rejected,
            blocking: rejecting,
            reasons: rejecting_reasons.into_iter().collect(),
        }
    } else if !postponing.is_empty() {
        Admission {
            response: CallResponse::Postponed,
            blocking: postponing,
            reasons: postponing_reasons.into_iter().collect(),
        }
    } else {
        Admission::accepted()
    };
    Ok(admission)
}

/// Ledger rows recording a task's resource intent
pub fn claims(task_id: &TaskId, resources: &Resources) -> Vec<TaskResource> {
    resources
        .iter()
        .map(|(key, op)| TaskResource::new(task_id.clone(), key.resource_type, key.resource_id, vec![op]))
        .collect()
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
