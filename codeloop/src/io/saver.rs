//! Persistence of the current code to a file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::debug;

use crate::core::naming::save_file_name;

pub trait CodeSaver {
    /// Persist `code` under a name derived from `description`; return the path written.
    fn save(&self, code: &str, description: &str) -> Result<PathBuf>;
}

/// Writes `code_<fragment>_<timestamp><suffix>` into a directory.
#[derive(Debug, Clone)]
pub struct FileSaver {
    dir: PathBuf,
    suffix: String,
}

impl FileSaver {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }
}

impl CodeSaver for FileSaver {
    fn save(&self, code: &str, description: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create save dir {}", self.dir.display()))?;
        let path = self
            .dir
            .join(save_file_name(description, &Local::now(), &self.suffix));
        fs::write(&path, code).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), "saved code");
        Ok(path)
    }
}
