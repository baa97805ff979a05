//! Helpers for running child processes with timeouts and bounded output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

/// How long reader threads may keep draining once the child is gone.
const READER_GRACE: Duration = Duration::from_secs(2);

type StreamResult = Result<(Vec<u8>, usize)>;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// How a supervised child's streams are handled while it runs.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Pipe stdout (otherwise it is discarded at the OS level).
    pub capture_stdout: bool,
    /// Forward each captured line to the log as it arrives, tagged with this source.
    pub echo_source: Option<String>,
}

impl StreamOptions {
    pub fn quiet() -> Self {
        Self {
            capture_stdout: true,
            echo_source: None,
        }
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
pub fn run_command_with_timeout(
    cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    run_command_with_streams(cmd, timeout, output_limit_bytes, &StreamOptions::quiet())
}

/// Run a command with a timeout, reading its streams line by line as they are produced.
///
/// stdin is closed. When `options.capture_stdout` is false stdout goes to the null device.
/// The child leads its own process group (unix). When the timeout fires first the whole group
/// is killed and `timed_out` is set. Once the child is gone, stragglers left in its group are
/// killed too, and readers still blocked on a pipe held by an escaped process are abandoned
/// after [`READER_GRACE`].
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes, capture_stdout = options.capture_stdout))]
pub fn run_command_with_streams(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
    options: &StreamOptions,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null()).stderr(Stdio::piped());
    isolate(&mut cmd);
    if options.capture_stdout {
        cmd.stdout(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null());
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stderr_echo = options.echo_source.clone().map(|source| Echo {
        stream: "stderr",
        source,
    });
    let stderr_rx = spawn_reader(stderr, output_limit_bytes, stderr_echo);

    let stdout_rx = if options.capture_stdout {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stdout_echo = options.echo_source.clone().map(|source| Echo {
            stream: "stdout",
            source,
        });
        Some(spawn_reader(stdout, output_limit_bytes, stdout_echo))
    } else {
        None
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };
    if !timed_out {
        kill_group_leftovers(&child);
    }

    let (stdout, stdout_truncated) = match stdout_rx {
        Some(rx) => collect_output(&rx, "stdout").context("join stdout")?,
        None => (Vec::new(), 0),
    };
    let (stderr, stderr_truncated) = collect_output(&stderr_rx, "stderr").context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Put the child in a fresh process group so a timeout can reach its descendants.
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

/// Kill the child and everything still in its process group.
fn kill_process_tree(child: &mut Child) -> Result<()> {
    match signal_group(child.id()) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(err = %err, "group kill failed, killing child only");
            child.kill().context("kill command")
        }
    }
}

/// Descendants that outlived a child which exited on its own.
fn kill_group_leftovers(child: &Child) {
    if signal_group(child.id()).is_ok() {
        debug!("killed leftover processes in child group");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).context("child pid out of range")?;
    killpg(Pid::from_raw(pgid), Signal::SIGKILL).context("signal process group")
}

#[cfg(not(unix))]
fn signal_group(_pid: u32) -> Result<()> {
    Err(anyhow!("process groups are unix-only"))
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    echo: Option<Echo>,
) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_stream_lines(reader, limit, echo));
    });
    rx
}

/// Wait at most [`READER_GRACE`] for a reader; a pipe held open elsewhere yields no output.
fn collect_output(rx: &Receiver<StreamResult>, stream: &'static str) -> StreamResult {
    match rx.recv_timeout(READER_GRACE) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(stream, "pipe still held open after exit, abandoning reader");
            Ok((Vec::new(), 0))
        }
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("output reader thread panicked")),
    }
}

struct Echo {
    stream: &'static str,
    source: String,
}

/// Read a stream line by line with a size limit, optionally echoing each line to the log.
fn read_stream_lines<R: Read>(
    reader: R,
    limit: usize,
    echo: Option<Echo>,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Some(echo) = &echo {
            let text = String::from_utf8_lossy(&line);
            info!(stream = echo.stream, source = %echo.source, "{}", text.trim_end());
        }

        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((collected, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let output = run_command_with_timeout(
            sh("echo out; echo err >&2; exit 3"),
            Duration::from_secs(5),
            1000,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(output.stderr_text(), "err\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn uncaptured_stdout_is_empty() {
        let options = StreamOptions {
            capture_stdout: false,
            echo_source: Some("test".to_string()),
        };
        let output = run_command_with_streams(
            sh("echo out; echo err >&2"),
            Duration::from_secs(5),
            1000,
            &options,
        )
        .expect("run");
        assert!(output.stdout.is_empty());
        assert_eq!(output.stderr_text(), "err\n");
    }

    #[test]
    fn kills_on_timeout() {
        let output = run_command_with_timeout(
            sh("exec sleep 5"),
            Duration::from_millis(200),
            1000,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn timeout_kills_forked_descendants() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 30; echo never"),
            Duration::from_millis(300),
            1000,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn background_leftovers_do_not_block_collection() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 30 & echo done >&2; exit 4"),
            Duration::from_secs(10),
            1000,
        )
        .expect("run");
        assert!(!output.timed_out);
        assert_eq!(output.status.code(), Some(4));
        assert_eq!(output.stderr_text(), "done\n");
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[test]
    fn truncates_beyond_limit() {
        let output =
            run_command_with_timeout(sh("printf 'abcdefghij' >&2"), Duration::from_secs(5), 4)
                .expect("run");
        assert_eq!(output.stderr_text(), "abcd");
        assert_eq!(output.stderr_truncated, 6);
        assert!(output.stderr_truncated_notice("x").contains("6 bytes"));
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command_with_timeout(
            Command::new("definitely-not-a-real-binary-xyz"),
            Duration::from_secs(1),
            100,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
