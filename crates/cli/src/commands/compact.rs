// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl compact` - rewrite the WAL from materialized state

use crate::output;
use crate::Context;
use anyhow::Result;
use dispatch_storage::CompactStats;
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

#[derive(Debug, Serialize)]
struct Compacted {
    before: u64,
    after: u64,
}

impl From<CompactStats> for Compacted {
    fn from(stats: CompactStats) -> Self {
        Self {
            before: stats.before,
            after: stats.after,
        }
    }
}

impl fmt::Display for Compacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compacted {} record(s) to {}", self.before, self.after)
    }
}

pub fn run(ctx: &Context) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let stats = store.compact()?;
    tracing::info!(before = stats.before, after = stats.after, path = %store.path().display(), "compacted store");
    output::print(&Compacted::from(stats), ctx.format)?;
    Ok(ExitCode::SUCCESS)
}
