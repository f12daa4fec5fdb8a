//! Generation adapter: prompt rendering, one completion round trip, cleanup.
//!
//! All three operations go through the same primitive,
//! [`Completer::complete`]. Transport errors never escape as panics or
//! `anyhow` errors; they are logged and returned as [`GenerationError`].

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::cleanup::clean_response;
use crate::io::completer::Completer;
use crate::io::diagnostic_log::DiagnosticLog;
use crate::io::prompt::PromptBuilder;

/// Characters of each outgoing prompt copied into the diagnostic log.
const LOGGED_PROMPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The backend call failed (transport, status, timeout, template).
    #[error("generation service failed: {0}")]
    Service(String),
    /// The backend answered but nothing was left after cleanup.
    #[error("generation service returned no code")]
    Empty,
}

pub struct CodeGenerator<C> {
    completer: C,
    prompts: PromptBuilder,
    log: DiagnosticLog,
}

impl<C: Completer> CodeGenerator<C> {
    pub fn new(completer: C, prompts: PromptBuilder, log: DiagnosticLog) -> Self {
        Self {
            completer,
            prompts,
            log,
        }
    }

    pub fn completer(&self) -> &C {
        &self.completer
    }

    /// Code for a fresh natural-language request.
    #[instrument(skip_all)]
    pub fn generate(&self, request: &str) -> Result<String, GenerationError> {
        let prompt = self.prompts.generate(request);
        self.ask(prompt)
    }

    /// `code` revised according to `instructions`.
    #[instrument(skip_all)]
    pub fn modify(&self, code: &str, instructions: &str) -> Result<String, GenerationError> {
        let prompt = self.prompts.modify(code, instructions);
        self.ask(prompt)
    }

    /// `code` repaired given the `error` text it produced.
    #[instrument(skip_all)]
    pub fn fix(
        &self,
        description: &str,
        code: &str,
        error: &str,
    ) -> Result<String, GenerationError> {
        let prompt = self.prompts.fix(description, code, error);
        self.ask(prompt)
    }

    fn ask(&self, prompt: anyhow::Result<String>) -> Result<String, GenerationError> {
        let prompt = prompt.map_err(|err| {
            warn!(err = %format!("{err:#}"), "prompt rendering failed");
            GenerationError::Service(format!("{err:#}"))
        })?;

        // Newlines are flattened so each log entry stays on one line.
        let head: String = prompt
            .chars()
            .take(LOGGED_PROMPT_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        self.log.record(&format!("Prompt sent: {head}..."));

        let raw = self.completer.complete(&prompt).map_err(|err| {
            let message = format!("{err:#}");
            warn!(err = %message, "completion failed");
            self.log.record(&format!("Error contacting generation service: {message}"));
            GenerationError::Service(message)
        })?;

        let code = clean_response(&raw);
        if code.is_empty() {
            debug!(raw_bytes = raw.len(), "completion empty after cleanup");
            return Err(GenerationError::Empty);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use anyhow::anyhow;

    use super::*;

    struct FakeCompleter {
        response: anyhow::Result<String>,
        prompts: RefCell<Vec<String>>,
    }

    impl FakeCompleter {
        fn new(response: anyhow::Result<String>) -> Self {
            Self {
                response,
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Completer for FakeCompleter {
        fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow!("{err}")),
            }
        }
    }

    fn generator(
        response: anyhow::Result<String>,
        log: DiagnosticLog,
    ) -> CodeGenerator<FakeCompleter> {
        CodeGenerator::new(
            FakeCompleter::new(response),
            PromptBuilder::new("Python"),
            log,
        )
    }

    #[test]
    fn generate_cleans_fenced_response() {
        let generator = generator(
            Ok("Here is your code:\n```python\nprint(\"hello\")\n```".to_string()),
            DiagnosticLog::disabled(),
        );
        assert_eq!(
            generator.generate("print hello world"),
            Ok("print(\"hello\")".to_string())
        );
        let prompts = generator.completer().prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("\n\nprint hello world"));
    }

    #[test]
    fn transport_error_is_logged_and_returned() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join("session.log");
        let generator = generator(
            Err(anyhow!("connection refused")),
            DiagnosticLog::new(&log_path),
        );

        let err = generator.fix("task", "code", "boom").unwrap_err();
        assert_eq!(
            err,
            GenerationError::Service("connection refused".to_string())
        );

        let log = fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("Prompt sent: "));
        assert!(log.contains("Error contacting generation service: connection refused"));
    }

    #[test]
    fn empty_response_is_an_error() {
        let generator = generator(Ok("```\n```".to_string()), DiagnosticLog::disabled());
        assert_eq!(
            generator.modify("x = 1", "rename x"),
            Err(GenerationError::Empty)
        );
    }

    #[test]
    fn logged_prompt_is_truncated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join("session.log");
        let generator = generator(Ok("pass".to_string()), DiagnosticLog::new(&log_path));

        generator.generate(&"x".repeat(1_000)).expect("generate");

        let log = fs::read_to_string(&log_path).expect("read log");
        let line = log.lines().next().expect("line");
        let logged = line
            .split_once("Prompt sent: ")
            .map(|(_, rest)| rest)
            .expect("prompt entry");
        assert_eq!(logged.chars().count(), LOGGED_PROMPT_CHARS + "...".len());
    }
}
