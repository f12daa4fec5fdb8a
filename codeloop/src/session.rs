//! Session state machine for one evolving piece of code.
//!
//! A [`Session`] owns the current code and description, the version history,
//! and its collaborators. Transitions return outcome values and never print;
//! the REPL decides how to surface them.
//!
//! Execution policy:
//!
//! - `generate` and `modify_with_instructions` run the new code once and never
//!   auto-fix.
//! - `run` auto-fixes exactly once on failure and never re-runs the fix.
//! - `modify_manually`, `revert`, `save` and `clear` never execute.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::history::{HistoryError, HistoryStore};
use crate::core::types::{CodeVersion, Description, ExecutionResult, Tag};
use crate::generator::{CodeGenerator, GenerationError};
use crate::io::completer::Completer;
use crate::io::diagnostic_log::DiagnosticLog;
use crate::io::executor::CodeExecutor;
use crate::io::saver::CodeSaver;

/// The working version the user is iterating on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    code: String,
    description: Description,
}

impl SessionState {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    fn replace(&mut self, code: String, description: Description) {
        self.code = code;
        self.description = description;
    }
}

/// Input problems. Never mutate state, never reach the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("No code loaded. Please generate or revert some code first.")]
    NoCode,
    #[error("Invalid history index.")]
    InvalidIndex(#[from] HistoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Nothing changed.
    Failed(GenerationError),
    /// New version recorded and run once.
    Generated {
        index: usize,
        code: String,
        execution: ExecutionResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded(ExecutionResult),
    /// The run failed and one fix attempt was made.
    Failed {
        execution: ExecutionResult,
        fix: FixOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// Fixed code recorded as a new version; not yet run.
    Fixed { index: usize, code: String },
    /// Nothing changed.
    Unfixed(GenerationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualEditOutcome {
    /// Blank input; nothing changed.
    Empty,
    Updated { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionEditOutcome {
    /// Blank instructions; nothing changed.
    NoInstructions,
    /// Nothing changed.
    Failed(GenerationError),
    /// The returned code equals the current code. It was still run once.
    Unchanged { execution: ExecutionResult },
    /// New version recorded after running it once.
    Updated {
        index: usize,
        code: String,
        execution: ExecutionResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingToSave,
    Saved(PathBuf),
}

pub struct Session<C, X, S> {
    state: SessionState,
    history: HistoryStore,
    generator: CodeGenerator<C>,
    executor: X,
    saver: S,
    log: DiagnosticLog,
    timeout: Duration,
}

impl<C, X, S> Session<C, X, S>
where
    C: Completer,
    X: CodeExecutor,
    S: CodeSaver,
{
    pub fn new(
        generator: CodeGenerator<C>,
        executor: X,
        saver: S,
        log: DiagnosticLog,
        timeout: Duration,
    ) -> Self {
        Self {
            state: SessionState::default(),
            history: HistoryStore::new(),
            generator,
            executor,
            saver,
            log,
            timeout,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &[CodeVersion] {
        self.history.list()
    }

    pub fn generator(&self) -> &CodeGenerator<C> {
        &self.generator
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn saver(&self) -> &S {
        &self.saver
    }

    /// Generate code for `request`, record it, and run it once.
    pub fn generate(&mut self, request: &str) -> GenerateOutcome {
        let code = match self.generator.generate(request) {
            Ok(code) => code,
            Err(err) => return GenerateOutcome::Failed(err),
        };

        self.state.replace(code.clone(), Description::new(request));
        let index = self.record();
        info!(index, "generated new version");

        let execution = self.execute_current();
        GenerateOutcome::Generated {
            index,
            code,
            execution,
        }
    }

    /// Run the current code; on failure make exactly one fix attempt.
    pub fn run(&mut self) -> Result<RunOutcome, InputError> {
        if !self.state.has_code() {
            return Err(InputError::NoCode);
        }

        let execution = self.execute_current();
        if execution.succeeded {
            return Ok(RunOutcome::Succeeded(execution));
        }

        let description = self.state.description.render();
        let fix = match self
            .generator
            .fix(&description, &self.state.code, &execution.stderr)
        {
            Ok(code) => {
                self.state.code = code.clone();
                self.state.description.push_tag(Tag::AutoFixed);
                let index = self.record();
                info!(index, "recorded auto-fixed version");
                FixOutcome::Fixed { index, code }
            }
            Err(err) => FixOutcome::Unfixed(err),
        };
        Ok(RunOutcome::Failed { execution, fix })
    }

    /// Replace the current code with user-typed text. Does not execute.
    pub fn modify_manually(&mut self, code: &str) -> ManualEditOutcome {
        if code.trim().is_empty() {
            return ManualEditOutcome::Empty;
        }
        self.state.code = code.to_string();
        self.state.description.push_tag(Tag::ModifiedByUser);
        let index = self.record();
        ManualEditOutcome::Updated { index }
    }

    /// Revise the current code from natural-language instructions and run the
    /// result once. A new version is recorded only when the code changed.
    pub fn modify_with_instructions(&mut self, instructions: &str) -> InstructionEditOutcome {
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return InstructionEditOutcome::NoInstructions;
        }

        let code = match self.generator.modify(&self.state.code, instructions) {
            Ok(code) => code,
            Err(err) => return InstructionEditOutcome::Failed(err),
        };

        let execution = self.executor.execute(&code, self.timeout);
        if code == self.state.code {
            debug!("instruction edit returned identical code");
            return InstructionEditOutcome::Unchanged { execution };
        }

        self.state.code = code.clone();
        self.state.description.push_tag(Tag::ModifiedByInstructions);
        let index = self.record();
        InstructionEditOutcome::Updated {
            index,
            code,
            execution,
        }
    }

    /// Make history entry `index` (1-based) current. Records nothing, runs nothing.
    pub fn revert(&mut self, index: usize) -> Result<&CodeVersion, InputError> {
        let entry = self.history.get(index)?;
        self.state.replace(
            entry.code.clone(),
            Description::new(format!("Reverted from history #{index}")),
        );
        debug!(index, "reverted to history entry");
        Ok(entry)
    }

    /// Read-only lookup of history entry `index` (1-based).
    pub fn view(&self, index: usize) -> Result<&CodeVersion, InputError> {
        Ok(self.history.get(index)?)
    }

    /// Persist the current code. I/O failures are returned to the caller.
    pub fn save(&self) -> Result<SaveOutcome> {
        if !self.state.has_code() {
            return Ok(SaveOutcome::NothingToSave);
        }
        let path = self
            .saver
            .save(&self.state.code, &self.state.description.render())?;
        self.log
            .record(&format!("Code saved to file: {}", path.display()));
        Ok(SaveOutcome::Saved(path))
    }

    pub fn clear(&mut self) {
        self.state = SessionState::default();
    }

    fn execute_current(&self) -> ExecutionResult {
        self.executor.execute(&self.state.code, self.timeout)
    }

    fn record(&mut self) -> usize {
        self.history
            .append(self.state.description.render(), self.state.code.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use anyhow::anyhow;

    use super::*;
    use crate::io::prompt::PromptBuilder;

    struct QueueCompleter(RefCell<VecDeque<String>>);

    impl Completer for QueueCompleter {
        fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            self.0
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted response"))
        }
    }

    struct FixedExecutor(ExecutionResult);

    impl CodeExecutor for FixedExecutor {
        fn execute(&self, _code: &str, _timeout: Duration) -> ExecutionResult {
            self.0.clone()
        }
    }

    struct NoSaver;

    impl CodeSaver for NoSaver {
        fn save(&self, _code: &str, _description: &str) -> anyhow::Result<PathBuf> {
            Err(anyhow!("disk full"))
        }
    }

    fn session(
        responses: &[&str],
        execution: ExecutionResult,
    ) -> Session<QueueCompleter, FixedExecutor, NoSaver> {
        let completer = QueueCompleter(RefCell::new(
            responses.iter().map(|r| r.to_string()).collect(),
        ));
        Session::new(
            CodeGenerator::new(
                completer,
                PromptBuilder::new("Python"),
                DiagnosticLog::disabled(),
            ),
            FixedExecutor(execution),
            NoSaver,
            DiagnosticLog::disabled(),
            Duration::from_secs(20),
        )
    }

    #[test]
    fn starts_idle() {
        let session = session(&[], ExecutionResult::success(""));
        assert!(!session.state().has_code());
        assert!(session.state().description().is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn generate_failure_leaves_state_untouched() {
        let mut session = session(&["```\n```"], ExecutionResult::success(""));
        assert_eq!(
            session.generate("anything"),
            GenerateOutcome::Failed(GenerationError::Empty)
        );
        assert!(!session.state().has_code());
        assert!(session.history().is_empty());
    }

    #[test]
    fn run_without_code_is_input_error() {
        let mut session = session(&[], ExecutionResult::success(""));
        assert_eq!(session.run(), Err(InputError::NoCode));
    }

    #[test]
    fn failed_fix_leaves_state_unchanged() {
        let mut session = session(
            &["print(1/0)"],
            ExecutionResult::failure("", "ZeroDivisionError"),
        );
        session.generate("divide");

        let outcome = session.run().expect("run");
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                fix: FixOutcome::Unfixed(GenerationError::Service(_)),
                ..
            }
        ));
        assert_eq!(session.state().code(), "print(1/0)");
        assert_eq!(session.state().description().render(), "divide");
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn manual_edit_tags_description() {
        let mut session = session(&["x = 1"], ExecutionResult::success(""));
        session.generate("set x");

        assert_eq!(
            session.modify_manually("x = 2\n\nprint(x)"),
            ManualEditOutcome::Updated { index: 2 }
        );
        assert_eq!(session.state().code(), "x = 2\n\nprint(x)");
        assert_eq!(
            session.state().description().render(),
            "set x (modified by user)"
        );
        assert_eq!(session.modify_manually("  \n "), ManualEditOutcome::Empty);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn save_error_is_propagated() {
        let mut session = session(&["x = 1"], ExecutionResult::success(""));
        session.generate("set x");
        let err = session.save().unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn clear_resets_state_but_keeps_history() {
        let mut session = session(&["x = 1"], ExecutionResult::success(""));
        session.generate("set x");
        session.clear();
        assert_eq!(session.state(), &SessionState::default());
        assert_eq!(session.history().len(), 1);
    }
}
