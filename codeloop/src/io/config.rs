//! Session configuration stored in `codeloop.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "codeloop.toml";

/// Session configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodeloopConfig {
    /// Wall-clock budget for one run of generated code, in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr of generated code beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Append-only diagnostic log.
    pub log_path: PathBuf,

    /// Directory that receives saved code files.
    pub save_dir: PathBuf,

    /// Language named in prompts (e.g. "Python").
    pub language: String,

    pub interpreter: InterpreterConfig,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Command prefix; the staged file path is appended as the last argument.
    pub command: Vec<String>,
    /// Extension for staged and saved files, including the dot.
    pub suffix: String,
    /// Where code is staged before running; the system temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string()],
            suffix: ".py".to_string(),
            staging_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pipe the prompt into a local CLI and read its stdout.
    Command,
    /// Call the Gemini REST API.
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub command: CommandBackendConfig,
    pub gemini: GeminiBackendConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Gemini,
            command: CommandBackendConfig::default(),
            gemini: GeminiBackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandBackendConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CommandBackendConfig {
    fn default() -> Self {
        Self {
            program: "codex".to_string(),
            args: vec![
                "exec".to_string(),
                "--skip-git-repo-check".to_string(),
                "-".to_string(),
            ],
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiBackendConfig {
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeminiBackendConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.2,
            max_output_tokens: 1500,
            timeout_secs: 120,
        }
    }
}

impl Default for CodeloopConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            output_limit_bytes: 100_000,
            log_path: PathBuf::from("codeloop_session.log"),
            save_dir: PathBuf::from("."),
            language: "Python".to_string(),
            interpreter: InterpreterConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl CodeloopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.language.trim().is_empty() {
            return Err(anyhow!("language must be non-empty"));
        }
        if self.interpreter.command.is_empty() || self.interpreter.command[0].trim().is_empty() {
            return Err(anyhow!("interpreter.command must be a non-empty array"));
        }
        match self.backend.kind {
            BackendKind::Command => {
                if self.backend.command.program.trim().is_empty() {
                    return Err(anyhow!("backend.command.program must be non-empty"));
                }
                if self.backend.command.timeout_secs == 0 {
                    return Err(anyhow!("backend.command.timeout_secs must be > 0"));
                }
            }
            BackendKind::Gemini => {
                let gemini = &self.backend.gemini;
                if gemini.model.trim().is_empty() {
                    return Err(anyhow!("backend.gemini.model must be non-empty"));
                }
                if gemini.api_key_env.trim().is_empty() {
                    return Err(anyhow!("backend.gemini.api_key_env must be non-empty"));
                }
                if !(0.0..=2.0).contains(&gemini.temperature) {
                    return Err(anyhow!("backend.gemini.temperature must be within 0.0..=2.0"));
                }
                if gemini.timeout_secs == 0 {
                    return Err(anyhow!("backend.gemini.timeout_secs must be > 0"));
                }
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CodeloopConfig::default()`.
pub fn load_config(path: &Path) -> Result<CodeloopConfig> {
    if !path.exists() {
        let cfg = CodeloopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CodeloopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CodeloopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
