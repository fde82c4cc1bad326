// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl matrix` - print the operation compatibility table

use crate::output;
use crate::Context;
use anyhow::Result;
use dispatch_core::{classify, Conflict, Operation};
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

/// One cell of the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub held: Operation,
    pub proposed: Operation,
    pub conflict: Conflict,
}

/// Every held/proposed pairing, row-major by held operation
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct MatrixView(Vec<MatrixCell>);

impl MatrixView {
    pub fn build() -> Self {
        let cells = Operation::ALL
            .into_iter()
            .flat_map(|held| {
                Operation::ALL.into_iter().map(move |proposed| MatrixCell {
                    held,
                    proposed,
                    conflict: classify(held, proposed),
                })
            })
            .collect();
        Self(cells)
    }

    pub fn cells(&self) -> &[MatrixCell] {
        &self.0
    }
}

impl fmt::Display for MatrixView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = Operation::ALL.map(|op| op.to_string());
        write!(f, "{}", row("held\\new", &header))?;
        for cells in self.0.chunks(Operation::ALL.len()) {
            let Some(first) = cells.first() else { continue };
            let conflicts: Vec<String> = cells.iter().map(|c| c.conflict.to_string()).collect();
            write!(f, "\n{}", row(first.held.as_str(), &conflicts))?;
        }
        Ok(())
    }
}

fn row(label: &str, cells: &[String]) -> String {
    let mut line = format!("{:<10}", label);
    for cell in cells {
        line.push_str(&format!("{:<10}", cell));
    }
    line.trim_end().to_string()
}

pub fn run(ctx: &Context) -> Result<ExitCode> {
    output::print(&MatrixView::build(), ctx.format)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
