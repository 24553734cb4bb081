//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// drupalcheck - drupal-check diagnostics for the command line and editors
#[derive(Parser)]
#[command(name = "drupalcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check PHP files with drupal-check
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// drupal-check executable, overriding the configuration
        #[arg(long, value_name = "PATH")]
        executable: Option<PathBuf>,

        /// Workspace root the analyzer runs in (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,
    },

    /// Start the LSP server
    Lsp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
