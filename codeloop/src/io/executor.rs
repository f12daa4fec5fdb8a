//! Code execution in a fresh interpreter process.
//!
//! The [`CodeExecutor`] trait decouples the session from process spawning.
//! Tests use scripted executors that return predetermined results.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::core::types::ExecutionResult;
use crate::io::process::run_command_with_timeout;

/// Runs a code string to completion or timeout.
///
/// Implementations never fail: spawn errors and timeouts are folded into a
/// failed [`ExecutionResult`].
pub trait CodeExecutor {
    fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult;
}

/// Executor that stages code to a temp file and runs `<command...> <file>`.
#[derive(Debug, Clone)]
pub struct InterpreterExecutor {
    command: Vec<String>,
    suffix: String,
    output_limit_bytes: usize,
    staging_dir: Option<PathBuf>,
}

impl InterpreterExecutor {
    pub fn new(command: Vec<String>, suffix: impl Into<String>, output_limit_bytes: usize) -> Self {
        Self {
            command,
            suffix: suffix.into(),
            output_limit_bytes,
            staging_dir: None,
        }
    }

    /// Stage code under `dir` instead of the system temp dir.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    fn try_execute(&self, code: &str, timeout: Duration) -> Result<ExecutionResult> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("interpreter command is empty"))?;

        // The staged file is removed when `staged` drops, on every return path.
        let staged = stage_code(code, &self.suffix, self.staging_dir.as_deref())?;
        debug!(path = %staged.path().display(), "staged code");

        let mut cmd = Command::new(program);
        cmd.args(args).arg(staged.path());
        let output = run_command_with_timeout(cmd, None, timeout, self.output_limit_bytes)
            .with_context(|| format!("run {program}"))?;

        let result = if output.timed_out {
            ExecutionResult::timeout()
        } else if output.status.success() {
            ExecutionResult::success(output.stdout_text())
        } else {
            warn!(exit_code = ?output.status.code(), "code exited with failure");
            ExecutionResult::failure(output.stdout_text(), output.stderr_text())
        };

        if let Err(err) = staged.close() {
            warn!(err = %err, "failed to remove staged code");
        }
        Ok(result)
    }
}

impl CodeExecutor for InterpreterExecutor {
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult {
        info!(bytes = code.len(), "executing code");
        match self.try_execute(code, timeout) {
            Ok(result) => result,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "execution raised");
                ExecutionResult::exception(format!("{err:#}"))
            }
        }
    }
}

fn stage_code(code: &str, suffix: &str, dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("codeloop-").suffix(suffix);
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .context("create staged code file")?;
    file.write_all(code.as_bytes()).context("write staged code")?;
    file.flush().context("flush staged code")?;
    Ok(file)
}
