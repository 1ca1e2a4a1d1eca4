// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wandelwerk command line.
//
// Entry point. Initialises logging, parses arguments and runs the command.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = %cli.config.display(), "Wandelwerk starting");

    match commands::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            commands::report_error(&err);
            ExitCode::FAILURE
        }
    }
}
