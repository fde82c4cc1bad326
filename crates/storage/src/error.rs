// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::wal::WalError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from ledger and journal stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error("store at {0} is locked by another process")]
    Locked(PathBuf),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
