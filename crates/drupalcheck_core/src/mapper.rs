//! Maps reported messages onto ranges of the in-memory document.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::diagnostic::{Diagnostic, Position, Range, SeverityMap};
use crate::report::RawMessage;
use crate::CheckerError;

static FATAL_ERROR: OnceLock<Regex> = OnceLock::new();
static UNCAUGHT_EXCEPTION: OnceLock<Regex> = OnceLock::new();

/// Only spaces and tabs count as indentation.
fn is_indent(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// Computes the range for a message on `line_text` (the line at `line_index`).
///
/// The range spans the whole line, starting after leading indentation. A line
/// made only of indentation starts on its last character. Trailing whitespace
/// is kept.
pub fn line_range(line_text: &str, line_index: u32) -> Range {
    let end = line_text.chars().map(|c| c.len_utf16() as u32).sum();

    let mut chars = line_text.chars();
    let mut start = 0u32;
    if let Some(first) = chars.next().filter(|c| is_indent(*c)) {
        let mut col = first.len_utf16() as u32;
        for ch in chars {
            start = col;
            if !is_indent(ch) {
                break;
            }
            col += ch.len_utf16() as u32;
        }
    }

    Range::new(
        Position::new(line_index, start),
        Position::new(line_index, end),
    )
}

/// Converts messages into diagnostics against `text`, preserving order.
///
/// Messages whose line is missing or outside the document are skipped.
pub fn map_messages(
    text: &str,
    messages: &[RawMessage],
    severity_map: &SeverityMap,
) -> Vec<Diagnostic> {
    let lines: Vec<&str> = text.split('\n').collect();

    messages
        .iter()
        .filter_map(|message| {
            let Some(index) = message
                .line
                .and_then(|line| line.checked_sub(1))
                .filter(|index| (*index as usize) < lines.len())
            else {
                debug!(
                    "Skipping message outside document ({} lines): line {:?}: {}",
                    lines.len(),
                    message.line,
                    message.message
                );
                return None;
            };

            let range = line_range(lines[index as usize], index);
            let severity = severity_map.resolve(message.severity.as_deref());
            Some(Diagnostic::new(range, message.message.clone()).with_severity(severity))
        })
        .collect()
}

/// Classifies a failed run from its stderr.
///
/// PHP fatal errors become `Fatal` (uncaught exceptions are unwrapped to their
/// message); anything else is an `Execution` error naming the command.
pub fn classify_failure(stderr: &str, command: &str) -> CheckerError {
    match fatal_error_message(stderr) {
        Some(message) => CheckerError::Fatal(message),
        None => CheckerError::Execution {
            command: command.to_string(),
        },
    }
}

/// Extracts the message of a PHP fatal error from stderr, if there is one.
pub fn fatal_error_message(stderr: &str) -> Option<String> {
    let fatal = FATAL_ERROR.get_or_init(|| {
        Regex::new(r"(?im)^(?:PHP\s?)?FATAL\s?ERROR:\s?(.*)$").expect("valid fatal error regex")
    });
    let uncaught = UNCAUGHT_EXCEPTION.get_or_init(|| {
        Regex::new(r"^Uncaught exception '.*' with message '(.*)'")
            .expect("valid uncaught exception regex")
    });

    let error = fatal.captures(stderr.trim())?.get(1)?.as_str().trim();
    let message = uncaught
        .captures(error)
        .and_then(|c| c.get(1))
        .map_or(error, |m| m.as_str());
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn message(line: u32, text: &str) -> RawMessage {
        RawMessage {
            line: Some(line),
            message: text.to_string(),
            severity: None,
            ignorable: None,
            tip: None,
        }
    }

    #[rstest]
    #[case::no_indent("$x = 1;", 0, 7)]
    #[case::spaces("  $x = 1;", 2, 9)]
    #[case::tabs("\t\treturn;", 2, 9)]
    #[case::mixed(" \t foo();", 3, 9)]
    #[case::empty("", 0, 0)]
    #[case::single_space(" ", 0, 1)]
    #[case::only_spaces("    ", 3, 4)]
    #[case::trailing_whitespace("  foo();  ", 2, 10)]
    #[case::carriage_return_kept("  foo();\r", 2, 9)]
    #[case::non_ascii("  $名前 = 1;", 2, 10)]
    #[case::surrogate_pair("  '🎉';", 2, 7)]
    fn test_line_range(
        #[case] line: &str,
        #[case] expected_start: u32,
        #[case] expected_end: u32,
    ) {
        let range = line_range(line, 4);
        assert_eq!(range.start, Position::new(4, expected_start));
        assert_eq!(range.end, Position::new(4, expected_end));
    }

    #[test]
    fn test_map_messages_scenario() {
        let diagnostics = map_messages(
            "  $x = 1;\n",
            &[message(1, "Undefined variable")],
            &SeverityMap::default(),
        );

        assert_eq!(
            diagnostics,
            vec![Diagnostic::new(
                Range::new(Position::new(0, 2), Position::new(0, 9)),
                "Undefined variable"
            )]
        );
    }

    #[test]
    fn test_map_messages_preserves_order_and_duplicates() {
        let text = "<?php\nfoo();\n  bar();\n";
        let messages = [
            message(3, "third"),
            message(2, "second"),
            message(3, "third"),
        ];

        let diagnostics = map_messages(text, &messages, &SeverityMap::default());
        let summary: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.range.start.line, d.range.start.character, d.message.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(2, 2, "third"), (1, 0, "second"), (2, 2, "third")]
        );
    }

    #[test]
    fn test_map_messages_skips_out_of_range_lines() {
        let text = "<?php\nfoo();";
        let mut no_line = message(1, "no line");
        no_line.line = None;
        let messages = [
            message(0, "zero"),
            message(2, "kept"),
            message(3, "stale"),
            no_line,
        ];

        let diagnostics = map_messages(text, &messages, &SeverityMap::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "kept");
        assert_eq!(diagnostics[0].range.start.line, 1);
    }

    #[test]
    fn test_map_messages_trailing_newline_line_is_addressable() {
        // Splitting "a\n" yields a final empty line, matching the editor's line count.
        let diagnostics = map_messages("a\n", &[message(2, "eof")], &SeverityMap::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].range,
            Range::new(Position::new(1, 0), Position::new(1, 0))
        );
    }

    #[test]
    fn test_map_messages_severity_is_error_by_default() {
        let mut tagged = message(1, "deprecated");
        tagged.severity = Some("deprecation".to_string());

        let diagnostics = map_messages("foo();", &[tagged.clone()], &SeverityMap::default());
        assert_eq!(diagnostics[0].severity, Severity::Error);

        let map = SeverityMap::new(
            Severity::Error,
            HashMap::from([("deprecation".to_string(), Severity::Warning)]),
        );
        let diagnostics = map_messages("foo();", &[tagged], &map);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[rstest]
    #[case::php_prefix("PHP Fatal error:  Allowed memory size exhausted", "Allowed memory size exhausted")]
    #[case::no_prefix("Fatal error: Class 'Foo' not found", "Class 'Foo' not found")]
    #[case::uncaught(
        "PHP Fatal error: Uncaught exception 'RuntimeException' with message 'No drupal root' in /x.php:3",
        "No drupal root"
    )]
    #[case::later_line("Warning: something\nPHP FATAL ERROR: boom", "boom")]
    fn test_classify_failure_fatal(#[case] stderr: &str, #[case] expected: &str) {
        match classify_failure(stderr, "drupal-check --format=json /a.php") {
            CheckerError::Fatal(message) => assert_eq!(message, expected),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_failure_unknown() {
        let err = classify_failure("Segmentation fault", "drupal-check --format=json /a.php");
        match err {
            CheckerError::Execution { command } => {
                assert_eq!(command, "drupal-check --format=json /a.php")
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }
}
