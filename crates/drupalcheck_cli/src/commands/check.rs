//! Check command implementation

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, miette};
use rayon::prelude::*;
use tracing::{debug, error, info};

use drupalcheck_core::{CheckRequest, Checker, CheckerConfig};

use crate::cli::{Cli, OutputFormat};
use crate::output::{CheckedFile, output_results};

pub fn run_check(
    cli: &Cli,
    files: &[PathBuf],
    format: OutputFormat,
    executable: Option<&Path>,
    workspace: Option<&Path>,
) -> Result<bool> {
    let root = match workspace {
        Some(dir) => std::path::absolute(dir).into_diagnostic()?,
        None => std::env::current_dir().into_diagnostic()?,
    };

    let mut config = load_config(cli, &root)?;
    if let Some(executable) = executable {
        config.executable_path = executable.display().to_string();
    }

    let checker = Checker::new(&config, Some(&root)).into_diagnostic()?;
    let threads = config.max_concurrent_checks.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .into_diagnostic()?;

    info!("Checking {} files with up to {} workers", files.len(), threads);

    // Indexed parallel iteration keeps results in input order.
    let outcomes: Vec<(PathBuf, Result<CheckedFile>)> = pool.install(|| {
        files
            .par_iter()
            .map(|path| (path.clone(), check_file(&checker, path, &root)))
            .collect()
    });

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failures = 0;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(checked) => results.push(checked),
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    let has_errors = output_results(&results, format)?;

    if failures > 0 {
        return Err(miette!(
            "{} of {} files could not be checked",
            failures,
            files.len()
        ));
    }

    Ok(has_errors)
}

fn load_config(cli: &Cli, root: &Path) -> Result<CheckerConfig> {
    if let Some(path) = &cli.config {
        return CheckerConfig::from_file(path).into_diagnostic();
    }

    match CheckerConfig::discover(root) {
        Some(path) => {
            debug!("Using config {}", path.display());
            CheckerConfig::from_file(&path).into_diagnostic()
        }
        None => Ok(CheckerConfig::default()),
    }
}

fn check_file(checker: &Checker, path: &Path, root: &Path) -> Result<CheckedFile> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    let absolute = std::path::absolute(path).into_diagnostic()?;

    let request =
        CheckRequest::from_path(text, &absolute, Some(root.to_path_buf())).into_diagnostic()?;
    let diagnostics = checker.check(&request).into_diagnostic()?;

    debug!("{}: {} diagnostics", path.display(), diagnostics.len());
    Ok(CheckedFile {
        path: path.to_path_buf(),
        diagnostics,
    })
}
