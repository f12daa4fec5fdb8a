//! Text-completion backends behind the generation adapter.
//!
//! The [`Completer`] trait is the single remote primitive: prompt in, raw text
//! out. Tests use scripted completers that return canned responses.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::io::config::{CommandBackendConfig, GeminiBackendConfig};
use crate::io::process::run_command_with_timeout;

/// Upper bound on captured completion text from a CLI backend.
const COMMAND_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub trait Completer {
    /// Send `prompt` and return the raw completion text.
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: Completer + ?Sized> Completer for Box<T> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// Completer that pipes the prompt into a local CLI and reads its stdout.
#[derive(Debug, Clone)]
pub struct CommandCompleter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCompleter {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &CommandBackendConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }
}

impl Completer for CommandCompleter {
    #[instrument(skip_all, fields(program = %self.program, timeout_secs = self.timeout.as_secs()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        info!("starting completion command");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            COMMAND_OUTPUT_LIMIT_BYTES,
        )
        .with_context(|| format!("run {}", self.program))?;

        if output.timed_out {
            warn!("completion command timed out");
            return Err(anyhow!(
                "{} timed out after {:?}",
                self.program,
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "completion command failed");
            return Err(anyhow!(
                "{} failed with status {:?}: {}",
                self.program,
                output.status.code(),
                output.stderr_text().trim()
            ));
        }

        debug!(bytes = output.stdout.bytes.len(), "completion command finished");
        Ok(output.stdout_text())
    }
}

/// Completer that calls the Gemini `generateContent` REST endpoint.
pub struct GeminiCompleter {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiCompleter {
    pub fn new(api_key: impl Into<String>, cfg: &GeminiBackendConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: cfg.model.trim_start_matches("models/").to_string(),
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
        })
    }

    /// Build from config, reading the API key from `cfg.api_key_env`.
    pub fn from_env(cfg: &GeminiBackendConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .with_context(|| format!("read Gemini API key from ${}", cfg.api_key_env))?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("${} is empty", cfg.api_key_env));
        }
        Self::new(api_key, cfg)
    }

    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

impl Completer for GeminiCompleter {
    #[instrument(skip_all, fields(model = %self.model))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        info!("sending Gemini request");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .context("Gemini API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(%status, "Gemini API returned error status");
            return Err(anyhow!("Gemini API error {status}: {}", body.trim()));
        }

        let parsed: GenerateContentResponse =
            response.json().context("parse Gemini response")?;
        extract_text(parsed)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("Gemini response contained no text"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_gemini_field_names() {
        let completer =
            GeminiCompleter::new("key", &GeminiBackendConfig::default()).expect("completer");
        let body = serde_json::to_value(completer.request_body("hi")).expect("json");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1500);
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn model_prefix_is_stripped() {
        let cfg = GeminiBackendConfig {
            model: "models/gemini-2.0-flash-lite".to_string(),
            ..GeminiBackendConfig::default()
        };
        let completer = GeminiCompleter::new("key", &cfg).expect("completer");
        assert_eq!(completer.model, "gemini-2.0-flash-lite");
    }

    #[test]
    fn extracts_joined_candidate_text() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"print("},{"text":"1)"}]}}]}"#,
        )
        .expect("parse");
        assert_eq!(extract_text(response).expect("text"), "print(1)");
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).expect("parse");
        assert!(extract_text(response).is_err());

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).expect("parse");
        assert!(extract_text(response).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_completer_reads_stdout() {
        let completer = CommandCompleter::new(
            "sh",
            vec!["-c".to_string(), "read line; echo \"got $line\"".to_string()],
            Duration::from_secs(5),
        );
        let text = completer.complete("prompt text\n").expect("complete");
        assert_eq!(text, "got prompt text\n");
    }

    #[cfg(unix)]
    #[test]
    fn command_completer_reports_nonzero_exit() {
        let completer = CommandCompleter::new(
            "sh",
            vec!["-c".to_string(), "cat >/dev/null; echo quota >&2; exit 2".to_string()],
            Duration::from_secs(5),
        );
        let err = completer.complete("prompt").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("status Some(2)"), "{message}");
        assert!(message.contains("quota"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn command_completer_reports_timeout() {
        let completer = CommandCompleter::new(
            "sh",
            vec!["-c".to_string(), "exec sleep 5".to_string()],
            Duration::from_millis(200),
        );
        let err = completer.complete("").unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
