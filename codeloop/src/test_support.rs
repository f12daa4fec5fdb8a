//! Scripted collaborators for driving a session without network, interpreter,
//! disk or terminal.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Local;

use crate::core::naming::save_file_name;
use crate::core::types::ExecutionResult;
use crate::generator::CodeGenerator;
use crate::io::completer::Completer;
use crate::io::console::{Console, ReadOutcome};
use crate::io::diagnostic_log::DiagnosticLog;
use crate::io::executor::CodeExecutor;
use crate::io::prompt::PromptBuilder;
use crate::io::saver::CodeSaver;
use crate::session::Session;

pub type ScriptedSession = Session<ScriptedCompleter, ScriptedExecutor, MemorySaver>;

/// Completer that replays queued responses and records every prompt.
///
/// Once the queue is empty every call fails, like an unreachable service.
#[derive(Debug, Default)]
pub struct ScriptedCompleter {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: &str) -> Self {
        self.responses.borrow_mut().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Completer for ScriptedCompleter {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

/// Executor that replays queued results and records the code it was given.
///
/// Once the queue is empty every run succeeds with empty output.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    results: RefCell<VecDeque<ExecutionResult>>,
    executed: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, result: ExecutionResult) -> Self {
        self.results.borrow_mut().push_back(result);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl CodeExecutor for ScriptedExecutor {
    fn execute(&self, code: &str, _timeout: Duration) -> ExecutionResult {
        self.executed.borrow_mut().push(code.to_string());
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::success(""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCode {
    pub path: PathBuf,
    pub code: String,
    pub description: String,
}

/// Saver that keeps files in memory under the names a real save would use.
#[derive(Debug, Default)]
pub struct MemorySaver {
    saved: RefCell<Vec<SavedCode>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<SavedCode> {
        self.saved.borrow().clone()
    }
}

impl CodeSaver for MemorySaver {
    fn save(&self, code: &str, description: &str) -> Result<PathBuf> {
        let path = PathBuf::from("memory").join(save_file_name(description, &Local::now(), ".py"));
        self.saved.borrow_mut().push(SavedCode {
            path: path.clone(),
            code: code.to_string(),
            description: description.to_string(),
        });
        Ok(path)
    }
}

/// Console fed from a queue of read outcomes; everything written is kept.
///
/// Once the queue is empty every read reports end of input.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<ReadOutcome>,
    output: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            input: lines
                .into_iter()
                .map(|line| ReadOutcome::Line(line.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    /// Queue a Ctrl-C after the lines already queued.
    pub fn then_interrupt(mut self) -> Self {
        self.input.push_back(ReadOutcome::Interrupted);
        self
    }

    pub fn output(&self) -> String {
        self.output.join("\n")
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        self.prompts.push(prompt.to_string());
        Ok(self.input.pop_front().unwrap_or(ReadOutcome::Eof))
    }

    fn write_line(&mut self, text: &str) {
        self.output.push(text.to_string());
    }
}

/// Session over scripted collaborators with logging disabled.
pub fn scripted_session(
    completer: ScriptedCompleter,
    executor: ScriptedExecutor,
) -> ScriptedSession {
    scripted_session_with_log(completer, executor, DiagnosticLog::disabled())
}

pub fn scripted_session_with_log(
    completer: ScriptedCompleter,
    executor: ScriptedExecutor,
    log: DiagnosticLog,
) -> ScriptedSession {
    Session::new(
        CodeGenerator::new(completer, PromptBuilder::new("Python"), log.clone()),
        executor,
        MemorySaver::new(),
        log,
        Duration::from_secs(20),
    )
}
