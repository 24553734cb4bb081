//! Diagnostic types produced by a check.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Source tag attached to every diagnostic.
pub const SOURCE: &str = "drupal-check";

/// Severity level for diagnostics.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed.
    #[default]
    Error,
    /// Warning - should be reviewed.
    Warning,
    /// Information - informational message.
    Information,
    /// Hint - low-priority suggestion.
    Hint,
}

impl Severity {
    /// Returns the lowercase name used in text output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
            Severity::Hint => "hint",
        }
    }
}

/// A zero-based position. `character` counts UTF-16 code units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open range between two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A diagnostic anchored to a range of the checked document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Range the diagnostic covers.
    pub range: Range,

    /// The analyzer message.
    pub message: String,

    /// Severity level.
    #[serde(default)]
    pub severity: Severity,

    /// Tool that produced the diagnostic.
    pub source: String,
}

impl Diagnostic {
    /// Creates a new error diagnostic tagged with [`SOURCE`].
    pub fn new(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
            severity: Severity::Error,
            source: SOURCE.to_string(),
        }
    }

    /// Sets the severity level.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Maps analyzer severity tags onto diagnostic severities.
///
/// Tags without an override resolve to `default`, which is `Error`, so an
/// empty map reports every message as an error. Tags are matched
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityMap {
    default: Severity,
    overrides: HashMap<String, Severity>,
}

impl SeverityMap {
    /// Builds the table, folding override keys to lowercase.
    ///
    /// Keys that differ only in case collapse to one entry; the key that sorts
    /// last wins, so the result does not depend on map iteration order.
    pub fn new(default: Severity, overrides: HashMap<String, Severity>) -> Self {
        let mut entries: Vec<(String, Severity)> = overrides.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let overrides = entries
            .into_iter()
            .map(|(key, severity)| (key.to_ascii_lowercase(), severity))
            .collect();
        Self { default, overrides }
    }

    /// Resolves an optional analyzer tag.
    pub fn resolve(&self, tag: Option<&str>) -> Severity {
        tag.and_then(|tag| self.overrides.get(&tag.to_ascii_lowercase()).copied())
            .unwrap_or(self.default)
    }
}
