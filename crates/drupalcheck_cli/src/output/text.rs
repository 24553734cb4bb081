//! Text output formatter

use drupalcheck_core::Diagnostic;

use super::CheckedFile;

pub fn output_text(results: &[CheckedFile]) {
    for result in results {
        for diag in &result.diagnostics {
            println!("{}", format_line(&result.path.display().to_string(), diag));
        }
    }

    let total_files = results.len();
    let total_issues: usize = results.iter().map(|r| r.diagnostics.len()).sum();

    println!();
    println!("Checked {} files, found {} issues", total_files, total_issues);
}

/// Formats a diagnostic as `path:line:col: severity: message [source]`.
///
/// Line and column are printed 1-based, as compilers do.
fn format_line(path: &str, diag: &Diagnostic) -> String {
    format!(
        "{}:{}:{}: {}: {} [{}]",
        path,
        diag.range.start.line + 1,
        diag.range.start.character + 1,
        diag.severity.as_str(),
        diag.message,
        diag.source
    )
}
