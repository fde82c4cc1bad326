// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations and the operation compatibility matrix
//!
//! Every call declares one operation per resource it touches. When a new call
//! proposes an operation on a resource that a queued or running task already
//! holds an operation on, the pair is classified:
//!
//! | held \ proposed | create   | read     | update   | delete   |
//! |-----------------|----------|----------|----------|----------|
//! | create          | reject   | postpone | postpone | postpone |
//! | read            | postpone | -        | postpone | postpone |
//! | update          | postpone | -        | postpone | postpone |
//! | delete          | postpone | reject   | reject   | reject   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A verb applied to a resource by a call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// Outcome of comparing a held operation against a proposed one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conflict {
    /// Both may run concurrently
    None,
    /// The proposed call waits until the holder finishes
    Postpone,
    /// The proposed call is refused
    Reject,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Conflict::None => "none",
            Conflict::Postpone => "postpone",
            Conflict::Reject => "reject",
        })
    }
}

/// Classify a proposed operation against one already held on the same resource
pub const fn classify(held: Operation, proposed: Operation) -> Conflict {
    use Operation::*;
    match (held, proposed) {
        (Create, Create) => Conflict::Reject,
        (Create, Read | Update | Delete) => Conflict::Postpone,

        (Read | Update, Read) => Conflict::None,
        (Read | Update, Create | Update | Delete) => Conflict::Postpone,

        (Delete, Create) => Conflict::Postpone,
        (Delete, Read | Update | Delete) => Conflict::Reject,
    }
}

/// Held operations that postpone the proposed operation
pub fn postponing_operations(proposed: Operation) -> Vec<Operation> {
    held_operations_classified(proposed, Conflict::Postpone)
}

/// Held operations that reject the proposed operation
pub fn rejecting_operations(proposed: Operation) -> Vec<Operation> {
    held_operations_classified(proposed, Conflict::Reject)
}

fn held_operations_classified(proposed: Operation, conflict: Conflict) -> Vec<Operation> {
    Operation::ALL
        .into_iter()
        .filter(|held| classify(*held, proposed) == conflict)
        .collect()
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
