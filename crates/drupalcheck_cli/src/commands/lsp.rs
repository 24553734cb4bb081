//! LSP command implementation

use miette::Result;
use tracing::warn;

use crate::cli::Cli;
use crate::utils::create_tokio_runtime;

pub fn run_lsp(cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.config {
        warn!(
            "--config is ignored by the language server ({}); use initializationOptions or .drupalcheck.json",
            path.display()
        );
    }

    create_tokio_runtime()?.block_on(async {
        drupalcheck_lsp::run().await;
    });
    Ok(())
}
