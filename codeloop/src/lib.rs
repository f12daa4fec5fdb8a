//! Interactive generate-run-fix loop for small programs.
//!
//! A user describes a program in natural language; a text-generation backend
//! writes the code, a local interpreter runs it, and failures get one
//! automatic repair attempt. Every version is kept in an in-memory history.
//!
//! - **[`core`]**: Pure, deterministic logic (command parsing, response
//!   cleanup, history, file naming). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (backends, subprocesses, files,
//!   terminal). Each sits behind a trait so tests can script it.
//!
//! [`session`] holds the state machine and [`repl`] renders it for a user.

pub mod core;
pub mod exit_codes;
pub mod generator;
pub mod io;
pub mod logging;
pub mod repl;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
