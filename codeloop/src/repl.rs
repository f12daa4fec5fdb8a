//! Interactive command loop over a [`Console`] and a [`Session`].
//!
//! The loop owns all user-facing text. Session transitions hand back outcome
//! values which are rendered here.

use anyhow::Result;
use tracing::debug;

use crate::core::command::{Command, MenuAction, parse_command, parse_menu_action};
use crate::core::types::{CodeVersion, ExecutionResult};
use crate::io::completer::Completer;
use crate::io::console::{Console, ReadOutcome};
use crate::io::executor::CodeExecutor;
use crate::io::saver::CodeSaver;
use crate::session::{
    FixOutcome, GenerateOutcome, InstructionEditOutcome, ManualEditOutcome, RunOutcome,
    SaveOutcome, Session,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TOP_PROMPT: &str = "Enter program description or command ('exit' to quit): ";
const MENU_PROMPT: &str = "Options: [run/modify/usermodification/save/history/clear/exit]: ";

const HELP: &str = "\
Commands:
  help            - Show this help message
  history         - List all past generated codes
  view <num>      - View code from history entry number
  revert <num>    - Revert current code to history entry
  save            - Save current code to a file
  run             - Run current code
  clear           - Clear current code
  exit            - Exit the program";

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// `exit` at the top level or in the menu.
    Exited,
    /// Input ended (Ctrl-D or closed stdin).
    EndOfInput,
    /// Ctrl-C at a prompt.
    Interrupted,
}

/// Where the menu hands control after an action.
enum MenuFlow {
    Stay,
    Leave,
    Stop(ReplExit),
}

/// How a multi-line block ends.
#[derive(Clone, Copy)]
enum BlockEnd {
    EmptyLine,
    EmptyLineOrDot,
}

pub struct Repl<'a, C, X, S, K> {
    session: &'a mut Session<C, X, S>,
    console: &'a mut K,
}

impl<'a, C, X, S, K> Repl<'a, C, X, S, K>
where
    C: Completer,
    X: CodeExecutor,
    S: CodeSaver,
    K: Console,
{
    pub fn new(session: &'a mut Session<C, X, S>, console: &'a mut K) -> Self {
        Self { session, console }
    }

    /// Run until the user exits, input ends, or an interrupt arrives.
    pub fn run(&mut self) -> Result<ReplExit> {
        self.say("=== codeloop: interactive code generation ===");
        self.say("Type 'help' for commands.");

        loop {
            let line = match self.console.read_line(TOP_PROMPT)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => {
                    self.say("Goodbye!");
                    return Ok(ReplExit::EndOfInput);
                }
                ReadOutcome::Interrupted => return Ok(ReplExit::Interrupted),
            };

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(err) => {
                    self.say(&err.to_string());
                    continue;
                }
            };
            debug!(?command, "top-level command");

            match command {
                Command::Empty => {}
                Command::Help => self.say(HELP),
                Command::History => self.show_history(),
                Command::View(index) => self.show_entry(index),
                Command::Revert(index) => self.revert(index),
                Command::Save => self.save(),
                Command::Run => self.run_current(),
                Command::Clear => {
                    self.session.clear();
                    self.say("Cleared current code.");
                }
                Command::Exit => {
                    self.say("Goodbye!");
                    return Ok(ReplExit::Exited);
                }
                Command::Generate(request) => {
                    if let Some(exit) = self.generate(&request)? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    /// Generate, auto-run, then hold the user in the menu. `Some` ends the loop.
    fn generate(&mut self, request: &str) -> Result<Option<ReplExit>> {
        self.say(&format!(
            "Generating code for request:\n{request}\nPlease wait..."
        ));

        match self.session.generate(request) {
            GenerateOutcome::Failed(err) => {
                self.say(&format!("Failed to generate code ({err}). Try again."));
                return Ok(None);
            }
            GenerateOutcome::Generated {
                code, execution, ..
            } => {
                self.say("\n=== Generated Code ===\n");
                self.say(&code);
                self.say("\n=== Running Generated Code ===\n");
                self.show_execution(&execution, "Error while running code:");
            }
        }

        loop {
            let line = match self.console.read_line(MENU_PROMPT)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => {
                    self.say("Goodbye!");
                    return Ok(Some(ReplExit::EndOfInput));
                }
                ReadOutcome::Interrupted => return Ok(Some(ReplExit::Interrupted)),
            };

            match self.menu_action(parse_menu_action(&line))? {
                MenuFlow::Stay => {}
                MenuFlow::Leave => return Ok(None),
                MenuFlow::Stop(exit) => return Ok(Some(exit)),
            }
        }
    }

    fn menu_action(&mut self, action: MenuAction) -> Result<MenuFlow> {
        match action {
            MenuAction::Run => self.run_current(),
            MenuAction::Modify => return self.modify_manually(),
            MenuAction::UserModification => return self.modify_with_instructions(),
            MenuAction::Save => self.save(),
            MenuAction::History => self.show_history(),
            MenuAction::Clear => {
                self.session.clear();
                self.say("Cleared current code.");
                return Ok(MenuFlow::Leave);
            }
            MenuAction::Exit => {
                self.say("Exiting current generation session.");
                return Ok(MenuFlow::Stop(ReplExit::Exited));
            }
            MenuAction::Unknown(_) => self.say(
                "Unknown option. Please choose: run, modify, usermodification, save, history, clear, or exit.",
            ),
        }
        Ok(MenuFlow::Stay)
    }

    fn modify_manually(&mut self) -> Result<MenuFlow> {
        self.say("Enter your modified code (finish with an empty line or a single '.' on a line):");
        let code = match self.read_block(BlockEnd::EmptyLineOrDot)? {
            Ok(code) => code,
            Err(exit) => return Ok(MenuFlow::Stop(exit)),
        };

        match self.session.modify_manually(&code) {
            ManualEditOutcome::Empty => self.say("Modification aborted; empty input."),
            ManualEditOutcome::Updated { .. } => {
                self.say("\nYou entered the following modified code:\n");
                self.say(&code);
                self.say("Code updated.");
            }
        }
        Ok(MenuFlow::Stay)
    }

    fn modify_with_instructions(&mut self) -> Result<MenuFlow> {
        self.say(
            "\nYou chose usermodification: Provide natural language instructions to modify the code.",
        );
        self.say("Enter your instructions below (end input with an empty line):");
        let instructions = match self.read_block(BlockEnd::EmptyLine)? {
            Ok(instructions) => instructions,
            Err(exit) => return Ok(MenuFlow::Stop(exit)),
        };

        match self.session.modify_with_instructions(&instructions) {
            InstructionEditOutcome::NoInstructions => {
                self.say("No instructions entered, no changes made.");
            }
            InstructionEditOutcome::Failed(err) => {
                self.say(&format!("Failed to get updated code ({err}). No changes made."));
            }
            InstructionEditOutcome::Unchanged { execution } => {
                self.say("\n=== Running Updated Code ===\n");
                self.show_execution(&execution, "Error while running updated code:");
                self.say("Updated code is identical to the current code; nothing recorded.");
            }
            InstructionEditOutcome::Updated {
                code, execution, ..
            } => {
                self.say("\n=== Updated Code ===\n");
                self.say(&code);
                self.say("\n=== Running Updated Code ===\n");
                self.show_execution(&execution, "Error while running updated code:");
            }
        }
        Ok(MenuFlow::Stay)
    }

    fn run_current(&mut self) {
        let outcome = match self.session.run() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.say(&err.to_string());
                return;
            }
        };

        self.say("\n=== Running Code ===");
        match outcome {
            RunOutcome::Succeeded(execution) => {
                self.say("\nSuccess! Output:\n");
                self.say(&execution.stdout);
            }
            RunOutcome::Failed { execution, fix } => {
                self.say("\nErrors while running code:");
                self.say(&execution.stderr);
                self.say("\nAttempting automatic fix...");
                match fix {
                    FixOutcome::Fixed { code, .. } => {
                        self.say("\n=== Fixed Code ===\n");
                        self.say(&code);
                        self.say("\nFixed code generated. Use 'run' to execute again.");
                    }
                    FixOutcome::Unfixed(err) => {
                        debug!(%err, "auto-fix failed");
                        self.say("Failed to fix the code automatically.");
                    }
                }
            }
        }
    }

    fn revert(&mut self, index: usize) {
        match self.session.revert(index).map(|_| ()) {
            Ok(()) => {
                self.say(&format!("Reverting to code version #{index}"));
                self.say("Reverted current code. Use 'run' to execute.");
            }
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn save(&mut self) {
        match self.session.save() {
            Ok(SaveOutcome::Saved(path)) => self.say(&format!("Code saved as {}", path.display())),
            Ok(SaveOutcome::NothingToSave) => self.say("No code to save."),
            Err(err) => self.say(&format!("Failed to save code: {err:#}")),
        }
    }

    fn show_history(&mut self) {
        let lines = render_history(self.session.history());
        self.say(&lines);
    }

    fn show_entry(&mut self, index: usize) {
        let text = match self.session.view(index) {
            Ok(entry) => render_entry(index, entry),
            Err(err) => err.to_string(),
        };
        self.say(&text);
    }

    fn show_execution(&mut self, execution: &ExecutionResult, failure_heading: &str) {
        if execution.succeeded {
            self.say("Output:\n");
            self.say(&execution.stdout);
        } else {
            self.say(&format!("{failure_heading}\n"));
            self.say(&execution.stderr);
        }
    }

    /// Read lines until `end`. `Err` carries an exit that arrived mid-block.
    fn read_block(&mut self, end: BlockEnd) -> Result<std::result::Result<String, ReplExit>> {
        let mut lines = Vec::new();
        loop {
            let line = match self.console.read_line("")? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => break,
                ReadOutcome::Interrupted => return Ok(Err(ReplExit::Interrupted)),
            };
            let stop = match end {
                BlockEnd::EmptyLine => line.trim().is_empty(),
                BlockEnd::EmptyLineOrDot => line.trim().is_empty() || line.trim() == ".",
            };
            if stop {
                break;
            }
            lines.push(line);
        }
        Ok(Ok(lines.join("\n")))
    }

    fn say(&mut self, text: &str) {
        self.console.write_line(text);
    }
}

fn render_history(entries: &[CodeVersion]) -> String {
    if entries.is_empty() {
        return "No history available.".to_string();
    }
    let mut out = format!("\n=== Session History ({} entries) ===", entries.len());
    for (offset, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{}] - {}",
            offset + 1,
            entry.created_at.format(TIMESTAMP_FORMAT),
            entry.description
        ));
    }
    out
}

fn render_entry(index: usize, entry: &CodeVersion) -> String {
    format!(
        "\n--- Code Entry #{index} ---\nDescription: {}\nTimestamp: {}\n\n{}",
        entry.description,
        entry.created_at.format(TIMESTAMP_FORMAT),
        entry.code
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;

    fn version(description: &str, code: &str) -> CodeVersion {
        CodeVersion {
            description: description.to_string(),
            code: code.to_string(),
            created_at: Local
                .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
                .single()
                .expect("unambiguous local time"),
        }
    }

    #[test]
    fn empty_history_has_placeholder() {
        assert_eq!(render_history(&[]), "No history available.");
    }

    #[test]
    fn history_lists_one_based_entries() {
        let text = render_history(&[version("sort", "a"), version("sort (auto-fixed)", "b")]);
        assert_eq!(
            text,
            "\n=== Session History (2 entries) ===\n\
             1. [2024-03-09 14:05:07] - sort\n\
             2. [2024-03-09 14:05:07] - sort (auto-fixed)"
        );
    }

    #[test]
    fn entry_shows_description_timestamp_and_code() {
        let text = render_entry(3, &version("sum", "print(1 + 2)"));
        assert_eq!(
            text,
            "\n--- Code Entry #3 ---\nDescription: sum\nTimestamp: 2024-03-09 14:05:07\n\nprint(1 + 2)"
        );
    }
}
