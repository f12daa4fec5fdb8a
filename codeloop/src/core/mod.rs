//! Deterministic, pure logic shared by the session.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod cleanup;
pub mod command;
pub mod history;
pub mod naming;
pub mod types;
