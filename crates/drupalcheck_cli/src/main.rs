//! drupalcheck CLI
//!
//! Runs drupal-check over PHP files, or serves its diagnostics over LSP.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Check {
            files,
            format,
            executable,
            workspace,
        } => commands::check::run_check(
            cli,
            files,
            *format,
            executable.as_deref(),
            workspace.as_deref(),
        ),
        Commands::Lsp => {
            commands::lsp::run_lsp(cli)?;
            Ok(false)
        }
    }
}
