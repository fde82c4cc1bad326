// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dispatchctl config` - print the effective configuration

use crate::output::OutputFormat;
use crate::Context;
use anyhow::Result;
use std::process::ExitCode;

pub fn run(ctx: &Context) -> Result<ExitCode> {
    match ctx.format {
        OutputFormat::Text => print!("{}", ctx.config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ctx.config)?),
    }
    Ok(ExitCode::SUCCESS)
}
