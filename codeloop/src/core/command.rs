//! Parsing of user input lines into session commands.
//!
//! Keywords are case-insensitive. Argument-free commands must be the whole
//! line, so "run a web server" stays a generation request. `view` and `revert`
//! are recognised by their first word and then require exactly one numeric
//! argument.

use thiserror::Error;

/// Top-level command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History,
    /// Show history entry (1-based).
    View(usize),
    /// Make history entry (1-based) the current code.
    Revert(usize),
    Save,
    Run,
    Clear,
    Exit,
    /// Blank line; re-prompt.
    Empty,
    /// Anything else is a request to generate code.
    Generate(String),
}

/// Action chosen from the menu shown after a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Run,
    /// Replace the code with raw text typed by the user.
    Modify,
    /// Revise the code from natural-language instructions.
    UserModification,
    Save,
    History,
    Clear,
    Exit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: {command} <history_number>")]
    Usage { command: &'static str },
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }

    let lowered = trimmed.to_lowercase();
    let command = match lowered.as_str() {
        "help" => Command::Help,
        "history" => Command::History,
        "save" => Command::Save,
        "run" => Command::Run,
        "clear" => Command::Clear,
        "exit" => Command::Exit,
        _ => {
            let mut words = lowered.split_whitespace();
            match words.next() {
                Some("view") => Command::View(parse_index(words, "view")?),
                Some("revert") => Command::Revert(parse_index(words, "revert")?),
                _ => Command::Generate(trimmed.to_string()),
            }
        }
    };
    Ok(command)
}

fn parse_index<'a>(
    mut args: impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<usize, CommandError> {
    let usage = CommandError::Usage { command };
    let arg = args.next().ok_or(usage.clone())?;
    if args.next().is_some() || !arg.chars().all(|c| c.is_ascii_digit()) {
        return Err(usage);
    }
    arg.parse().map_err(|_| usage)
}

pub fn parse_menu_action(line: &str) -> MenuAction {
    let action = line.trim().to_lowercase();
    match action.as_str() {
        "run" => MenuAction::Run,
        "modify" => MenuAction::Modify,
        "usermodification" => MenuAction::UserModification,
        "save" => MenuAction::Save,
        "history" => MenuAction::History,
        "clear" => MenuAction::Clear,
        "exit" => MenuAction::Exit,
        _ => MenuAction::Unknown(action),
    }
}
