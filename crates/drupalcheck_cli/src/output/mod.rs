//! Output formatting module

mod json;
mod text;

use std::path::PathBuf;

use miette::Result;

use drupalcheck_core::{Diagnostic, Severity};

use crate::cli::OutputFormat;

/// Diagnostics for one checked file.
#[derive(Debug)]
pub struct CheckedFile {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckedFile {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

pub fn output_results(results: &[CheckedFile], format: OutputFormat) -> Result<bool> {
    let has_errors = results.iter().any(CheckedFile::has_errors);

    match format {
        OutputFormat::Json => json::output_json(results)?,
        OutputFormat::Text => text::output_text(results),
    }

    Ok(has_errors)
}
