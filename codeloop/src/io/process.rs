//! Child processes with a hard timeout and bounded output capture.
//!
//! Shared by the interpreter executor and the CLI completion backend. Stdin is
//! fed and both output pipes are drained on helper threads, so a chatty child
//! can never block on a full pipe while we wait on it.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Extra time granted to output readers after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// One output stream, cut at the configured limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and discarded.
    pub dropped: usize,
}

impl Captured {
    /// Lossy UTF-8, with a notice appended when bytes were dropped.
    pub fn text(&self, label: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[{label} truncated {} bytes]\n", self.dropped));
        }
        text
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    /// The child outlived its budget and was killed, or something it started
    /// still held the output pipes when the budget ran out.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        self.stdout.text("stdout")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.text("stderr")
    }

    /// Normal exit with status 0 inside the budget.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Spawn `cmd`, optionally pipe `stdin` into it, and wait at most `timeout`.
///
/// Each output stream keeps at most `output_limit_bytes`; the rest is drained
/// and counted. On timeout the child is killed and reaped before returning.
///
/// The call is bounded even when the child leaves descendants holding its
/// output pipes open: readers still running at the deadline are abandoned and
/// whatever they captured so far is returned. If the child exited in time but
/// its pipes stayed open past the budget, the run counts as timed out.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .inspect_err(|err| error!(%err, "failed to spawn command"))
        .context("spawn command")?;

    let feeder = match stdin {
        Some(input) => {
            let pipe = child.stdin.take().context("stdin was not piped")?;
            let input = input.to_vec();
            Some(thread::spawn(move || feed(pipe, &input)))
        }
        None => None,
    };
    let stdout = StreamReader::spawn(
        child.stdout.take().context("stdout was not piped")?,
        output_limit_bytes,
    );
    let stderr = StreamReader::spawn(
        child.stderr.take().context("stderr was not piped")?,
        output_limit_bytes,
    );

    let (status, mut timed_out) = wait_or_kill(&mut child, timeout)?;

    // Drain until the budget runs out, but always leave a short grace period
    // for bytes already sitting in the pipes.
    let drain_deadline = (started + timeout).max(Instant::now() + DRAIN_GRACE);
    let (stdout, stdout_complete) = stdout.finish(drain_deadline).context("collect stdout")?;
    let (stderr, stderr_complete) = stderr.finish(drain_deadline).context("collect stderr")?;
    if !(stdout_complete && stderr_complete) {
        warn!("output pipes still open after the deadline, abandoning readers");
        timed_out = true;
    }

    if let Some(feeder) = feeder {
        if feeder.is_finished() {
            match feeder.join() {
                Ok(Ok(())) => {}
                // A child may exit without reading all of its input.
                Ok(Err(err)) => debug!(%err, "stdin not fully written"),
                Err(_) => return Err(anyhow!("stdin writer thread panicked")),
            }
        } else {
            debug!("stdin writer still blocked, abandoning it");
        }
    }

    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
    child.kill().context("kill command")?;
    let status = child.wait().context("reap command after kill")?;
    Ok((status, true))
}

/// Dropping the pipe on return closes it, so the child sees end of input.
fn feed(mut pipe: ChildStdin, input: &[u8]) -> io::Result<()> {
    pipe.write_all(input)
}

/// Background reader filling a shared buffer, so a partial capture can be
/// taken without waiting for end of stream.
struct StreamReader {
    captured: Arc<Mutex<Captured>>,
    done: Receiver<Result<()>>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(reader: R, limit: usize) -> Self {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&captured);
        thread::spawn(move || {
            let result = read_limited(reader, limit, &sink);
            // The receiver is gone once the caller stopped waiting.
            let _ = tx.send(result);
        });
        Self { captured, done }
    }

    /// Wait for end of stream until `deadline`. The flag reports whether the
    /// stream actually ended.
    fn finish(self, deadline: Instant) -> Result<(Captured, bool)> {
        let wait = deadline.saturating_duration_since(Instant::now());
        let complete = match self.done.recv_timeout(wait) {
            Ok(result) => {
                result?;
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        };
        let captured = self
            .captured
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?
            .clone();
        Ok((captured, complete))
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize, sink: &Mutex<Captured>) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.dropped += n - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let output = run_command_with_timeout(
            sh("echo out; echo err >&2; exit 3"),
            None,
            Duration::from_secs(5),
            1_000,
        )
        .expect("run");
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout_text(), "out\n");
        assert_eq!(output.stderr_text(), "err\n");
    }

    #[test]
    fn pipes_stdin_to_child() {
        let output =
            run_command_with_timeout(sh("cat"), Some(b"ping"), Duration::from_secs(5), 1_000)
                .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout_text(), "ping");
    }

    #[test]
    fn child_ignoring_stdin_is_not_an_error() {
        let input = vec![b'x'; 1 << 20];
        let output =
            run_command_with_timeout(sh("echo done"), Some(&input), Duration::from_secs(5), 1_000)
                .expect("run");
        assert_eq!(output.stdout_text(), "done\n");
    }

    #[test]
    fn kills_child_on_timeout() {
        let output = run_command_with_timeout(
            sh("exec sleep 5"),
            None,
            Duration::from_millis(200),
            1_000,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn background_process_holding_pipes_does_not_extend_timeout() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 3 & echo started; sleep 3"),
            None,
            Duration::from_millis(300),
            1_000,
        )
        .expect("run");
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert!(output.timed_out);
        assert_eq!(output.stdout_text(), "started\n");
    }

    #[test]
    fn exited_child_with_lingering_background_process_counts_as_timed_out() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 3 & exit 0"),
            None,
            Duration::from_millis(300),
            1_000,
        )
        .expect("run");
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn drops_output_beyond_limit() {
        let output = run_command_with_timeout(
            sh("printf 'abcdefghij'"),
            None,
            Duration::from_secs(5),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout.bytes, b"abcd");
        assert_eq!(output.stdout.dropped, 6);
        assert!(output.stdout_text().ends_with("[stdout truncated 6 bytes]\n"));
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command_with_timeout(
            Command::new("/nonexistent/codeloop-interpreter"),
            None,
            Duration::from_secs(1),
            1_000,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
