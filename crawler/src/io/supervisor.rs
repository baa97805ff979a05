//! Per-file process supervision.
//!
//! The [`Supervisor`] trait decouples the orchestrator from real interpreter
//! processes. Tests use scripted supervisors that return predetermined
//! outcomes without spawning anything.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::classifier::classify;
use crate::core::types::{FileOutcome, FileStatus};
use crate::io::process::{StreamOptions, run_command_with_streams};

/// Parameters for checking one file.
#[derive(Debug, Clone)]
pub struct SuperviseRequest {
    /// Script to run.
    pub file: PathBuf,
    /// Wall-clock budget before the child is killed.
    pub timeout: Duration,
    /// Pipe and echo stdout; never affects classification.
    pub capture_stdout: bool,
}

/// Runs one file in isolation and reports exactly one outcome.
///
/// Implementations are shared across worker threads.
pub trait Supervisor: Sync {
    fn supervise(&self, request: &SuperviseRequest) -> FileOutcome;
}

/// Supervisor that spawns a fresh interpreter process per file.
#[derive(Debug, Clone)]
pub struct InterpreterSupervisor {
    /// Interpreter command; the file path is appended.
    pub interpreter: Vec<String>,
    /// Working directory for every child.
    pub workdir: PathBuf,
    /// Bound on captured bytes per stream.
    pub output_limit_bytes: usize,
}

impl Supervisor for InterpreterSupervisor {
    #[instrument(skip_all, fields(file = %request.file.display(), timeout_secs = request.timeout.as_secs()))]
    fn supervise(&self, request: &SuperviseRequest) -> FileOutcome {
        let Some((program, args)) = self.interpreter.split_first() else {
            return FileOutcome::fatal(&request.file, "no interpreter configured");
        };
        let mut cmd = Command::new(program);
        cmd.args(args).arg(&request.file).current_dir(&self.workdir);

        let options = StreamOptions {
            capture_stdout: request.capture_stdout,
            echo_source: request
                .capture_stdout
                .then(|| request.file.display().to_string()),
        };
        let output = match run_command_with_streams(
            cmd,
            request.timeout,
            self.output_limit_bytes,
            &options,
        ) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %err, "could not run interpreter");
                return FileOutcome::fatal(&request.file, &format!("{err:#}"));
            }
        };

        let mut diagnostic = output.stderr_text();
        diagnostic.push_str(&output.stderr_truncated_notice("script"));
        let status = classify(output.status.code(), &diagnostic, output.timed_out);
        if output.timed_out {
            diagnostic.push_str(&format!(
                "\n[killed after {}s without exiting]\n",
                request.timeout.as_secs()
            ));
        }
        if status == FileStatus::Clean {
            diagnostic.clear();
        }

        debug!(status = status.label(), exit_code = ?output.status.code(), "file checked");
        FileOutcome {
            path: request.file.clone(),
            status,
            diagnostic,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn supervisor(workdir: &Path) -> InterpreterSupervisor {
        InterpreterSupervisor {
            interpreter: vec!["sh".to_string()],
            workdir: workdir.to_path_buf(),
            output_limit_bytes: 10_000,
        }
    }

    fn check(dir: &Path, body: &str, timeout: Duration) -> FileOutcome {
        let file = dir.join("script.sh");
        fs::write(&file, body).expect("write script");
        supervisor(dir).supervise(&SuperviseRequest {
            file,
            timeout,
            capture_stdout: false,
        })
    }

    #[test]
    fn clean_script_has_empty_diagnostic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = check(
            temp.path(),
            "echo hello\necho warn >&2\n",
            Duration::from_secs(5),
        );
        assert_eq!(outcome.status, FileStatus::Clean);
        assert!(outcome.diagnostic.is_empty());
    }

    #[test]
    fn failing_script_is_fatal_with_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = check(
            temp.path(),
            "echo 'TypeError: boom' >&2\nexit 1\n",
            Duration::from_secs(5),
        );
        assert_eq!(
            outcome.status,
            FileStatus::FatalError("TypeError: boom\n".to_string())
        );
        assert_eq!(outcome.diagnostic, "TypeError: boom\n");
    }

    #[test]
    fn module_failure_is_missing_dependency() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = check(
            temp.path(),
            "echo \"Error: Cannot find module 'left-pad'\" >&2\nexit 1\n",
            Duration::from_secs(5),
        );
        assert_eq!(
            outcome.status,
            FileStatus::MissingDependency("left-pad".to_string())
        );
    }

    #[test]
    fn hung_script_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = check(temp.path(), "exec sleep 10\n", Duration::from_millis(300));
        assert_eq!(outcome.status, FileStatus::Timeout);
        assert!(outcome.diagnostic.contains("killed after"));
    }

    #[test]
    fn script_with_child_process_times_out_on_time() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started = std::time::Instant::now();
        let outcome = check(temp.path(), "sleep 30\necho late\n", Duration::from_millis(300));
        assert_eq!(outcome.status, FileStatus::Timeout);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "{:?}",
            started.elapsed()
        );
    }

    #[test]
    fn missing_interpreter_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("script.sh");
        fs::write(&file, "true\n").expect("write");
        let supervisor = InterpreterSupervisor {
            interpreter: vec!["no-such-interpreter-xyz".to_string()],
            workdir: temp.path().to_path_buf(),
            output_limit_bytes: 100,
        };
        let outcome = supervisor.supervise(&SuperviseRequest {
            file,
            timeout: Duration::from_secs(1),
            capture_stdout: false,
        });
        assert!(matches!(outcome.status, FileStatus::FatalError(_)));
        assert!(outcome.diagnostic.contains("spawn command"));
    }
}
