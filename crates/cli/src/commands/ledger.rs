// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl ledger` - inspect or reset resource claims

use crate::output;
use crate::Context;
use anyhow::Result;
use clap::{Args, Subcommand};
use dispatch_core::{Operation, TaskId};
use dispatch_storage::{LedgerStore, MemoryLedger, TaskResource};
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

#[derive(Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand)]
pub enum LedgerCommand {
    /// List resources held by queued and running tasks
    List,
    /// Drop every row, as a coordinator does on startup
    Clear,
}

/// A ledger row as shown to operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub task_id: TaskId,
    pub resource: String,
    pub operations: Vec<Operation>,
}

impl From<TaskResource> for LedgerRow {
    fn from(row: TaskResource) -> Self {
        Self {
            resource: row.key().to_string(),
            task_id: row.task_id,
            operations: row.operations,
        }
    }
}

impl fmt::Display for LedgerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops: Vec<&str> = self.operations.iter().map(Operation::as_str).collect();
        write!(f, "{}\t{}\t{}", self.task_id, self.resource, ops.join(","))
    }
}

/// Rows sorted by task, then resource
pub fn rows(ledger: &dyn LedgerStore) -> Result<Vec<LedgerRow>> {
    let mut rows: Vec<LedgerRow> = ledger.entries()?.into_iter().map(LedgerRow::from).collect();
    rows.sort_by(|a, b| (&a.task_id, &a.resource).cmp(&(&b.task_id, &b.resource)));
    Ok(rows)
}

#[derive(Debug, Serialize)]
struct Cleared {
    removed: usize,
}

impl fmt::Display for Cleared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Removed {} ledger row(s)", self.removed)
    }
}

pub fn run(ctx: &Context, args: LedgerArgs) -> Result<ExitCode> {
    match args.command {
        LedgerCommand::List => {
            let ledger = MemoryLedger::from(ctx.load_state()?.ledger);
            output::print_list(&rows(&ledger)?, ctx.format, "No resources held")?;
        }
        LedgerCommand::Clear => {
            let removed = ctx.open_store()?.clear()?;
            tracing::info!(removed, "cleared resource ledger");
            output::print(&Cleared { removed }, ctx.format)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
