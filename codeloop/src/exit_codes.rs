//! Stable exit codes for the `codeloop` binary.

/// Session ended through `exit` or end of input.
pub const OK: i32 = 0;
/// Startup failed: invalid config, unusable backend, or terminal errors.
pub const INVALID: i32 = 1;
/// Session ended by Ctrl-C.
pub const INTERRUPTED: i32 = 130;
