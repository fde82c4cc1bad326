// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl calls` - journaled calls awaiting resubmission

use crate::output;
use crate::Context;
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use dispatch_core::TaskId;
use dispatch_storage::{CallJournal, MemoryJournal, QueuedCall};
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

#[derive(Args)]
pub struct CallsArgs {
    #[command(subcommand)]
    pub command: CallsCommand,
}

#[derive(Subcommand)]
pub enum CallsCommand {
    /// List calls that were queued or running at last shutdown
    List {
        /// Only calls with this task type
        #[arg(long)]
        task_type: Option<String>,
    },
}

/// Summary of a journaled call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRow {
    pub task_id: TaskId,
    pub queued_at: DateTime<Utc>,
    pub call_request_id: String,
    pub task_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip)]
    summary: String,
}

impl From<QueuedCall> for CallRow {
    fn from(call: QueuedCall) -> Self {
        let QueuedCall {
            task_id,
            queued_at,
            request,
        } = call;
        let summary = request.to_string();
        Self {
            task_id,
            queued_at,
            call_request_id: request.id,
            task_type: request.task_type,
            tags: request.tags,
            summary,
        }
    }
}

impl fmt::Display for CallRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            self.task_id,
            self.queued_at.format("%Y-%m-%d %H:%M:%S"),
            self.summary
        )
    }
}

/// Journaled calls in queue order, optionally filtered by task type
pub fn rows(journal: &dyn CallJournal, task_type: Option<&str>) -> Result<Vec<CallRow>> {
    Ok(journal
        .load()?
        .into_iter()
        .filter(|call| task_type.map_or(true, |t| call.request.task_type == t))
        .map(CallRow::from)
        .collect())
}

pub fn run(ctx: &Context, args: CallsArgs) -> Result<ExitCode> {
    match args.command {
        CallsCommand::List { task_type } => {
            let journal = MemoryJournal::from(ctx.load_state()?.calls);
            let rows = rows(&journal, task_type.as_deref())?;
            output::print_list(&rows, ctx.format, "No journaled calls")?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[path = "calls_tests.rs"]
mod tests;
