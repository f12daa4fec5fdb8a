//! Line-oriented terminal I/O for the interactive session.

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// Result of asking the user for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// End of input (Ctrl-D or closed stdin).
    Eof,
    /// Ctrl-C at the prompt.
    Interrupted,
}

pub trait Console {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
    fn write_line(&mut self, text: &str);
}

/// rustyline-backed console with in-memory line history.
pub struct TerminalConsole {
    editor: DefaultEditor,
}

impl TerminalConsole {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("initialize line editor")?;
        Ok(Self { editor })
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        debug!(%err, "line not added to editor history");
                    }
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err).context("read line"),
        }
    }

    fn write_line(&mut self, text: &str) {
        println!("{text}");
    }
}
