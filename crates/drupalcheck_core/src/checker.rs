//! Check orchestration: run the analyzer, then map its report.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use crate::config::CheckerConfig;
use crate::diagnostic::{Diagnostic, SeverityMap};
use crate::invoker::{self, InvocationResult, Invoker};
use crate::mapper;
use crate::report::AnalysisReport;
use crate::CheckerError;

/// A single document to check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Current text of the document.
    pub text: String,
    /// Document URI; must be a `file:` URI.
    pub uri: Url,
    /// Working directory for the analyzer, if any.
    pub workspace_root: Option<PathBuf>,
}

impl CheckRequest {
    pub fn new(text: impl Into<String>, uri: Url, workspace_root: Option<PathBuf>) -> Self {
        Self {
            text: text.into(),
            uri,
            workspace_root,
        }
    }

    /// Creates a request for a local file path.
    pub fn from_path(
        text: impl Into<String>,
        path: &Path,
        workspace_root: Option<PathBuf>,
    ) -> Result<Self, CheckerError> {
        let uri = Url::from_file_path(path)
            .map_err(|_| CheckerError::InvalidUri(path.display().to_string()))?;
        Ok(Self::new(text, uri, workspace_root))
    }

    /// The path handed to the analyzer, with its drive letter normalized.
    pub fn file_path(&self) -> Result<PathBuf, CheckerError> {
        let path = self
            .uri
            .to_file_path()
            .map_err(|_| CheckerError::InvalidUri(self.uri.to_string()))?;
        Ok(PathBuf::from(invoker::normalize_drive_letter(
            &path.to_string_lossy(),
        )))
    }
}

/// Runs `drupal-check` for documents.
///
/// Holds only immutable state, so one instance can serve concurrent checks.
#[derive(Debug, Clone)]
pub struct Checker {
    invoker: Invoker,
    severity_map: SeverityMap,
}

impl Checker {
    /// Resolves the executable and prepares a checker.
    pub fn new(config: &CheckerConfig, workspace_root: Option<&Path>) -> Result<Self, CheckerError> {
        let root = workspace_root.or(config.base_dir.as_deref());
        let executable = invoker::resolve_executable(&config.executable_path, root)?;
        debug!("Using drupal-check at {}", executable.display());

        let invoker = Invoker::new(executable)
            .with_timeout(config.timeout())
            .with_extra_args(config.extra_args.clone());

        Ok(Self::with_invoker(invoker, config.severity_map()))
    }

    /// Creates a checker from an already-built invoker.
    pub fn with_invoker(invoker: Invoker, severity_map: SeverityMap) -> Self {
        Self {
            invoker,
            severity_map,
        }
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Checks one document.
    ///
    /// Empty documents short-circuit to no diagnostics without spawning the
    /// analyzer. Otherwise returns all diagnostics or a single error.
    pub fn check(&self, request: &CheckRequest) -> Result<Vec<Diagnostic>, CheckerError> {
        if request.text.is_empty() {
            debug!("Skipping empty document: {}", request.uri);
            return Ok(Vec::new());
        }

        let file_path = request.file_path()?;
        let output = self.invoker.run(
            &file_path,
            &request.text,
            request.workspace_root.as_deref(),
        )?;

        let command = self.invoker.command_line(&file_path);
        diagnostics_from_output(
            &request.text,
            &file_path,
            &output,
            &self.severity_map,
            &command,
        )
    }
}

/// Maps captured analyzer output onto diagnostics for `text`.
///
/// `checked_path` is canonicalized before lookup because the analyzer reports
/// real paths. A report without that path yields no diagnostics.
pub fn diagnostics_from_output(
    text: &str,
    checked_path: &Path,
    output: &InvocationResult,
    severity_map: &SeverityMap,
    command: &str,
) -> Result<Vec<Diagnostic>, CheckerError> {
    let stdout = output.stdout_lossy();
    let stderr = output.stderr_lossy();

    let report = match AnalysisReport::parse(&stdout) {
        Ok(report) => report,
        Err(err) => {
            if mapper::fatal_error_message(&stderr).is_some()
                || (stdout.trim().is_empty() && !stderr.trim().is_empty())
            {
                return Err(mapper::classify_failure(&stderr, command));
            }
            return Err(err);
        }
    };

    for general in &report.errors {
        warn!("drupal-check: {}", general);
    }

    let canonical = canonical_path(checked_path);
    match report.messages_for(&canonical) {
        Some(messages) => Ok(mapper::map_messages(text, messages, severity_map)),
        None => {
            debug!("No messages for {}", canonical.display());
            Ok(Vec::new())
        }
    }
}

/// Resolves symlinks; falls back to the given path if it cannot be resolved.
pub fn canonical_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(real) => strip_verbatim_prefix(real),
        Err(e) => {
            debug!("Cannot canonicalize {}: {}", path.display(), e);
            path.to_path_buf()
        }
    }
}

// `canonicalize` yields `\\?\C:\...` on Windows; the analyzer reports `C:\...`.
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) if !stripped.starts_with("UNC") => PathBuf::from(stripped),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Position, Range, Severity};
    use pretty_assertions::assert_eq;
    use std::fs;

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }

    fn output(stdout: &str, stderr: &str) -> InvocationResult {
        InvocationResult {
            status: exit_status(1),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn report_for(path: &Path, messages: &str) -> String {
        let key = serde_json::to_string(&path.to_string_lossy()).unwrap();
        format!(r#"{{"totals":{{}},"files":{{{key}:{{"messages":{messages}}}}},"errors":[]}}"#)
    }

    const COMMAND: &str = "drupal-check --format=json";

    #[test]
    fn test_empty_document_does_not_spawn() {
        // The executable does not exist; spawning it would fail.
        let checker = Checker::with_invoker(
            Invoker::new("/nonexistent/drupal-check"),
            SeverityMap::default(),
        );
        let uri = Url::parse("file:///app/empty.php").unwrap();
        let request = CheckRequest::new("", uri, None);

        assert_eq!(checker.check(&request).unwrap(), vec![]);
    }

    #[test]
    fn test_spawn_failure_is_invocation_error() {
        let checker = Checker::with_invoker(
            Invoker::new("/nonexistent/drupal-check"),
            SeverityMap::default(),
        );
        let uri = Url::parse("file:///app/a.php").unwrap();
        let request = CheckRequest::new("<?php\n", uri, None);

        match checker.check(&request) {
            Err(CheckerError::Invocation { command, .. }) => {
                assert!(command.contains("/nonexistent/drupal-check --format=json"))
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_file_uri_is_rejected() {
        let checker = Checker::with_invoker(Invoker::new("drupal-check"), SeverityMap::default());
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        let request = CheckRequest::new("<?php", uri, None);

        assert!(matches!(
            checker.check(&request),
            Err(CheckerError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_scenario_leading_whitespace() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.php");
        fs::write(&file, "  $x = 1;\n").unwrap();
        let real = fs::canonicalize(&file).unwrap();

        let stdout = report_for(&real, r#"[{"line":1,"message":"Undefined variable"}]"#);
        let diagnostics = diagnostics_from_output(
            "  $x = 1;\n",
            &file,
            &output(&stdout, ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();

        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(
            diag.range,
            Range::new(Position::new(0, 2), Position::new(0, 9))
        );
        assert_eq!(diag.message, "Undefined variable");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.source, "drupal-check");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_path_is_resolved_before_lookup() {
        let temp = tempfile::tempdir().unwrap();
        let real_dir = temp.path().join("real");
        fs::create_dir(&real_dir).unwrap();
        let real_file = real_dir.join("a.module");
        fs::write(&real_file, "<?php\nfoo();\n").unwrap();
        let link_dir = temp.path().join("link");
        std::os::unix::fs::symlink(&real_dir, &link_dir).unwrap();

        let stdout = report_for(
            &fs::canonicalize(&real_file).unwrap(),
            r#"[{"line":2,"message":"Call to undefined function foo()"}]"#,
        );
        let diagnostics = diagnostics_from_output(
            "<?php\nfoo();\n",
            &link_dir.join("a.module"),
            &output(&stdout, ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(1, 0));
        assert_eq!(diagnostics[0].range.end, Position::new(1, 6));
    }

    #[test]
    fn test_file_absent_from_report_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.php");
        fs::write(&file, "<?php").unwrap();

        let stdout = report_for(
            Path::new("/somewhere/else.php"),
            r#"[{"line":1,"message":"x"}]"#,
        );
        let diagnostics = diagnostics_from_output(
            "<?php",
            &file,
            &output(&stdout, ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_empty_files_array_is_empty() {
        let diagnostics = diagnostics_from_output(
            "<?php",
            Path::new("/app/a.php"),
            &output(r#"{"totals":{},"files":[],"errors":[]}"#, ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_message_count_and_order_preserved() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("b.php");
        let text = "<?php\n$a;\n$b;\n$c;\n";
        fs::write(&file, text).unwrap();

        let stdout = report_for(
            &fs::canonicalize(&file).unwrap(),
            r#"[{"line":4,"message":"c"},{"line":2,"message":"a"},{"line":3,"message":"b"},{"line":2,"message":"a"}]"#,
        );
        let diagnostics = diagnostics_from_output(
            text,
            &file,
            &output(&stdout, ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();

        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["c", "a", "b", "a"]);
    }

    #[test]
    fn test_malformed_stdout_is_invalid_output() {
        let err = diagnostics_from_output(
            "<?php",
            Path::new("/app/a.php"),
            &output("Note: Using configuration file /app/phpstan.neon.", ""),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap_err();
        assert!(matches!(err, CheckerError::InvalidOutput(_)), "{err:?}");
    }

    #[test]
    fn test_fatal_stderr_is_classified() {
        let err = diagnostics_from_output(
            "<?php",
            Path::new("/app/a.php"),
            &output(
                "",
                "PHP Fatal error:  Uncaught exception 'Exception' with message 'Drupal root not found'",
            ),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap_err();
        match err {
            CheckerError::Fatal(message) => assert_eq!(message, "Drupal root not found"),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_stderr_names_command() {
        let err = diagnostics_from_output(
            "<?php",
            Path::new("/app/a.php"),
            &output("", "Segmentation fault (core dumped)"),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap_err();
        assert!(err.to_string().contains(COMMAND));
    }

    #[test]
    fn test_stderr_noise_with_valid_report_is_ignored() {
        let diagnostics = diagnostics_from_output(
            "<?php",
            Path::new("/app/a.php"),
            &output(
                r#"{"files":[],"errors":[]}"#,
                "Deprecated: Return type of Foo::bar() should be compatible",
            ),
            &SeverityMap::default(),
            COMMAND,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_request_file_path() {
        let uri = Url::parse("file:///var/www/web/index.php").unwrap();
        let request = CheckRequest::new("x", uri, None);
        assert_eq!(
            request.file_path().unwrap(),
            PathBuf::from("/var/www/web/index.php")
        );
    }

    #[cfg(windows)]
    #[test]
    fn test_request_file_path_uppercases_drive() {
        let uri = Url::parse("file:///c:/site/web/index.php").unwrap();
        let request = CheckRequest::new("x", uri, None);
        let path = request.file_path().unwrap();
        assert!(path.to_string_lossy().starts_with("C:"));
    }

    #[test]
    fn test_canonical_path_falls_back_for_missing_file() {
        let path = Path::new("/definitely/not/here.php");
        assert_eq!(canonical_path(path), path.to_path_buf());
    }
}
