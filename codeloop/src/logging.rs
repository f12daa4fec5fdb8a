//! Tracing setup for the `codeloop` binary.
//!
//! Tracing is for whoever is debugging codeloop itself. It goes to stderr,
//! is filtered by `RUST_LOG`, and is never persisted. The session record a
//! user keeps is the diagnostic log (`io::diagnostic_log`), whose path is set
//! by `--log-file` or `log_path` in `codeloop.toml` and which `RUST_LOG` does
//! not affect.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber: compact lines on stderr.
///
/// Call once, before the REPL takes the terminal. Process spawns and staged
/// files are only visible at `debug`:
///
/// ```bash
/// RUST_LOG=codeloop=debug codeloop --backend command --timeout 5
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
