//! Append-only diagnostic log of prompts, transport errors and saves.
//!
//! This is a product artifact, independent of `RUST_LOG` tracing. Each entry
//! is one `[YYYY-mm-dd HH:MM:SS] message` line. Writes are best-effort: a
//! failure is reported through tracing and otherwise ignored.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that discards every entry.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one timestamped line. Never fails.
    pub fn record(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = append_line(path, message) {
            warn!(
                path = %path.display(),
                err = %format!("{err:#}"),
                "diagnostic log write failed"
            );
        }
    }
}

fn append_line(path: &Path, message: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{timestamp}] {message}").with_context(|| format!("write {}", path.display()))
}
