// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl check` - dry-run admission against the persisted ledger
//!
//! Nothing is written. The exit code carries the decision so scripts can
//! branch on it: 0 accepted, 2 postponed, 3 rejected.

use crate::output;
use crate::Context;
use anyhow::Result;
use clap::Args;
use dispatch_core::{CallResponse, ConflictReason, Operation, ResourceKey, Resources, TaskId};
use dispatch_engine::find_conflicts;
use dispatch_storage::{LedgerStore, MemoryLedger};
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

#[derive(Args)]
pub struct CheckArgs {
    /// Resource operations, e.g. `repository:zoo=update`
    #[arg(required = true, value_parser = Resources::parse_entry)]
    pub resources: Vec<(ResourceKey, Operation)>,
}

/// Decision for a proposed set of resource operations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub response: CallResponse,
    pub blocking: Vec<TaskId>,
    pub reasons: Vec<ConflictReason>,
}

impl CheckOutcome {
    pub fn exit_code(&self) -> u8 {
        match self.response {
            CallResponse::Accepted => 0,
            CallResponse::Postponed => 2,
            CallResponse::Rejected => 3,
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response)?;
        for reason in &self.reasons {
            write!(f, "\n  {}", reason)?;
        }
        Ok(())
    }
}

pub fn evaluate(ledger: &dyn LedgerStore, resources: &Resources) -> Result<CheckOutcome> {
    let admission = find_conflicts(ledger, resources)?;
    Ok(CheckOutcome {
        response: admission.response,
        blocking: admission.blocking.into_iter().collect(),
        reasons: admission.reasons,
    })
}

pub fn run(ctx: &Context, args: CheckArgs) -> Result<ExitCode> {
    let ledger = MemoryLedger::from(ctx.load_state()?.ledger);
    // A repeated resource keeps the last operation
    let resources: Resources = args.resources.into_iter().collect();
    let outcome = evaluate(&ledger, &resources)?;
    tracing::debug!(response = %outcome.response, reasons = outcome.reasons.len(), "dry-run admission");
    output::print(&outcome, ctx.format)?;
    Ok(ExitCode::from(outcome.exit_code()))
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
