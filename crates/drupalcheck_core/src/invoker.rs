//! Runs the analyzer executable with a hard wall-clock timeout.

use std::env;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::CheckerError;

/// Time after which a running analyzer is killed: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured state of one finished analyzer run.
#[derive(Debug)]
pub struct InvocationResult {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl InvocationResult {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Immutable description of how to run the analyzer.
#[derive(Debug, Clone)]
pub struct Invoker {
    executable: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl Invoker {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments placed before `--format=json`.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the argument list: extra args, `--format=json`, then the target.
    pub fn build_args(&self, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push(OsString::from("--format=json"));
        args.push(target.as_os_str().to_owned());
        args
    }

    /// Renders the command line for error messages and logs.
    pub fn command_line(&self, target: &Path) -> String {
        let mut parts = vec![self.executable.display().to_string()];
        parts.extend(
            self.build_args(target)
                .iter()
                .map(|a| a.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Runs the analyzer on `target`, feeding `input` through stdin.
    ///
    /// Blocks until the process exits or the timeout elapses. On timeout the
    /// process is killed and `CheckerError::Timeout` is returned. A non-zero
    /// exit status is not an error here; the analyzer exits 1 when it finds
    /// problems.
    pub fn run(
        &self,
        target: &Path,
        input: &str,
        cwd: Option<&Path>,
    ) -> Result<InvocationResult, CheckerError> {
        let command = self.command_line(target);
        debug!("Running: {}", command);

        let mut cmd = Command::new(&self.executable);
        cmd.args(self.build_args(target))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        isolate_process_tree(&mut cmd);

        let invocation_error = |reason: String| CheckerError::Invocation {
            command: command.clone(),
            reason,
        };

        let mut child = cmd.spawn().map_err(|e| invocation_error(e.to_string()))?;

        let stdin = child.stdin.take();
        let input = input.to_owned();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes())?;
            }
            Ok(())
        });
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                error!("Killing `{}` after {:?}", command, self.timeout);
                kill_process_tree(&mut child);
                return Err(CheckerError::Timeout {
                    command: command.clone(),
                    timeout: self.timeout,
                });
            }
            Err(e) => {
                kill_process_tree(&mut child);
                return Err(invocation_error(e.to_string()));
            }
        };

        // A closed stdin (BrokenPipe) only means the analyzer ignored the input.
        match writer.join() {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(invocation_error(format!("failed to write stdin: {e}")));
            }
            Err(_) => return Err(invocation_error("stdin writer panicked".to_string())),
            _ => {}
        }

        let stdout = join_reader(stdout_reader).map_err(invocation_error)?;
        let stderr = join_reader(stderr_reader).map_err(invocation_error)?;

        debug!("`{}` exited with {}", command, status);

        Ok(InvocationResult {
            status,
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            stream.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, String> {
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(format!("failed to read output: {e}")),
        Err(_) => Err("output reader panicked".to_string()),
    }
}

/// Polls the child until it exits. `Ok(None)` means the deadline passed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Starts the analyzer in its own process group so a timeout can take down
/// everything it spawned (e.g. `php` under a shell wrapper).
#[cfg(unix)]
fn isolate_process_tree(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_tree(_cmd: &mut Command) {}

/// Kills the child and all of its descendants, then reaps the child.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    // The child leads its own group, so its pid is the group id.
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        let _ = child.wait();
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// Kills the child and all of its descendants, then reaps the child.
#[cfg(windows)]
fn kill_process_tree(child: &mut Child) {
    let killed = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &child.id().to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !killed {
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Uppercases the drive letter of a Windows-style path (`c:\x` → `C:\x`).
///
/// The analyzer reports canonical paths with an uppercase drive; a lowercase
/// one would never match a report key. Other paths are returned unchanged.
pub fn normalize_drive_letter(path: &str) -> String {
    let bytes = path.as_bytes();
    let is_drive_path = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/');

    if is_drive_path {
        let mut normalized = path.to_string();
        normalized[..1].make_ascii_uppercase();
        normalized
    } else {
        path.to_string()
    }
}

/// Locates the analyzer executable.
///
/// A configured value containing a path separator must name an existing file.
/// A bare name is looked up in `<workspace_root>/vendor/bin` and then on `PATH`.
pub fn resolve_executable(
    configured: &str,
    workspace_root: Option<&Path>,
) -> Result<PathBuf, CheckerError> {
    if configured.trim().is_empty() {
        return Err(CheckerError::construction("executable path is empty"));
    }

    let as_path = Path::new(configured);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        let path = match workspace_root {
            Some(root) if as_path.is_relative() => root.join(as_path),
            _ => as_path.to_path_buf(),
        };
        return if path.is_file() {
            Ok(path)
        } else {
            Err(CheckerError::construction(format!(
                "executable not found at {}",
                path.display()
            )))
        };
    }

    let mut searched = Vec::new();
    if let Some(root) = workspace_root {
        searched.push(root.join("vendor").join("bin"));
    }
    if let Some(path_var) = env::var_os("PATH") {
        searched.extend(env::split_paths(&path_var));
    }

    searched
        .iter()
        .flat_map(|dir| candidate_names(configured).map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            CheckerError::construction(format!(
                "could not find `{}` in vendor/bin or PATH",
                configured
            ))
        })
}

fn candidate_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let suffixes: &[&str] = if cfg!(windows) {
        &["", ".bat", ".cmd", ".exe"]
    } else {
        &[""]
    };
    suffixes.iter().map(move |suffix| format!("{name}{suffix}"))
}
