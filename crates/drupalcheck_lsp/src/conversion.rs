//! LSP type conversion utilities.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use drupalcheck_core::{
    Diagnostic as CheckDiagnostic, Position as CheckPosition, Range as CheckRange,
    Severity as CheckSeverity,
};

/// Converts a checker diagnostic to an LSP diagnostic.
pub fn to_lsp_diagnostic(diag: &CheckDiagnostic) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(diag.range),
        severity: Some(to_lsp_severity(diag.severity)),
        source: Some(diag.source.clone()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

pub fn to_lsp_severity(severity: CheckSeverity) -> DiagnosticSeverity {
    match severity {
        CheckSeverity::Error => DiagnosticSeverity::ERROR,
        CheckSeverity::Warning => DiagnosticSeverity::WARNING,
        CheckSeverity::Information => DiagnosticSeverity::INFORMATION,
        CheckSeverity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn to_lsp_range(range: CheckRange) -> Range {
    Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

fn to_lsp_position(position: CheckPosition) -> Position {
    Position::new(position.line, position.character)
}
