// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dispatchctl - inspect and maintain dispatch coordinator state

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

mod commands;
mod logging;
mod output;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use commands::{calls, check, ledger};
use dispatch_core::DispatchConfig;
use dispatch_storage::{MaterializedState, WalStore};
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "dispatchctl",
    version,
    about = "Inspect and maintain dispatch coordinator state"
)]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured state directory
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the operation compatibility matrix
    Matrix,
    /// Resource ledger management
    Ledger(ledger::LedgerArgs),
    /// Journaled call management
    Calls(calls::CallsArgs),
    /// Dry-run admission of resource operations against the ledger
    Check(check::CheckArgs),
    /// Rewrite the write-ahead log from current state
    Compact,
    /// Print the effective configuration
    Config,
}

/// Settings and store access shared by every command
pub struct Context {
    pub config: DispatchConfig,
    pub format: OutputFormat,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => DispatchConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => match DispatchConfig::default_path() {
                Some(path) => DispatchConfig::load_or_default(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => DispatchConfig::default(),
            },
        };
        if let Some(dir) = &cli.state_dir {
            config.storage.state_dir = dir.clone();
        }
        Ok(Self {
            config,
            format: cli.format,
        })
    }

    /// Open the store for writing, taking its exclusive lock
    pub fn open_store(&self) -> Result<WalStore> {
        let path = self.config.storage.wal_path();
        WalStore::open(&path).with_context(|| format!("failed to open store {}", path.display()))
    }

    /// Replay the store for inspection. Works alongside a running
    /// coordinator and leaves a missing state dir alone.
    pub fn load_state(&self) -> Result<MaterializedState> {
        let path = self.config.storage.wal_path();
        MaterializedState::load(&path)
            .with_context(|| format!("failed to read store {}", path.display()))
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let ctx = Context::load(&cli)?;
    let _log_guard = logging::setup_logging(&ctx.config.log)?;

    match cli.command {
        Commands::Matrix => commands::matrix::run(&ctx),
        Commands::Ledger(args) => ledger::run(&ctx, args),
        Commands::Calls(args) => calls::run(&ctx, args),
        Commands::Check(args) => check::run(&ctx, args),
        Commands::Compact => commands::compact::run(&ctx),
        Commands::Config => commands::config::run(&ctx),
    }
}
