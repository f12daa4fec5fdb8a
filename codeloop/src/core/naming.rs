//! File naming for saved code.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;

/// Longest description fragment carried into a file name, in characters.
pub const MAX_FRAGMENT_CHARS: usize = 30;

/// Fragment used when the description is empty.
pub const DEFAULT_FRAGMENT: &str = "saved_code";

static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("unsafe chars regex"));

/// Replace every character outside word characters and `-` with `_`, then cap
/// the result at [`MAX_FRAGMENT_CHARS`].
pub fn sanitize_fragment(description: &str) -> String {
    let source = if description.is_empty() {
        DEFAULT_FRAGMENT
    } else {
        description
    };
    UNSAFE_CHARS_RE
        .replace_all(source, "_")
        .chars()
        .take(MAX_FRAGMENT_CHARS)
        .collect()
}

/// Build `code_<fragment>_<YYYYmmdd_HHMMSS><suffix>`.
///
/// Collisions are avoided only by the one-second timestamp granularity.
pub fn save_file_name<Tz: TimeZone>(description: &str, at: &DateTime<Tz>, suffix: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "code_{}_{}{}",
        sanitize_fragment(description),
        at.format("%Y%m%d_%H%M%S"),
        suffix
    )
}
