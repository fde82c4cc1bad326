// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job member ordering
//!
//! Members of a job may depend on each other by call request id. They are
//! admitted in dependency order so that every member's dependencies are
//! already queued when it is enqueued.

use crate::task::CallHandle;
use dispatch_core::CallRequest;
use std::collections::{BTreeSet, HashMap};

/// Handles for every member of a submitted job, in submission order
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub calls: Vec<CallHandle>,
}

impl JobHandle {
    /// True when no member was rejected
    pub fn all_admitted(&self) -> bool {
        self.calls
            .iter()
            .all(|call| call.response() != dispatch_core::CallResponse::Rejected)
    }
}

/// Order job members so dependencies come first. Ties keep submission order.
///
/// Dependencies outside the job are ignored here. On a cycle, returns the
/// call request ids that could not be ordered.
pub fn topological_order(requests: &[CallRequest]) -> Result<Vec<usize>, Vec<String>> {
    let index: HashMap<&str, usize> = requests
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; requests.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); requests.len()];
    for (i, request) in requests.iter().enumerate() {
        for dependency in request.dependencies.keys() {
            if let Some(&j) = index.get(dependency.as_str()) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..requests.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(requests.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &k in &dependents[i] {
            in_degree[k] -= 1;
            if in_degree[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if order.len() < requests.len() {
        let stuck = (0..requests.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| requests[i].id.clone())
            .collect();
        return Err(stuck);
    }
    Ok(order)
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
