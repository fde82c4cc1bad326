// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod calls;
pub mod check;
pub mod compact;
pub mod config;
pub mod ledger;
pub mod matrix;
