//! Side-effecting collaborators: processes, files, network, terminal.

pub mod completer;
pub mod config;
pub mod console;
pub mod diagnostic_log;
pub mod executor;
pub mod process;
pub mod prompt;
pub mod saver;
