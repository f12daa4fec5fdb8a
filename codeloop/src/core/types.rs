//! Shared value types for the session core.
//!
//! These types carry no I/O. Code is always an opaque `String`; only the
//! executor interprets it.

use std::fmt;

use chrono::{DateTime, Local};

/// Annotation appended to a description each time the code is revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Code replaced by the fix generated after a failed `run`.
    AutoFixed,
    /// Code replaced by raw text typed in by the user.
    ModifiedByUser,
    /// Code replaced by a natural-language edit request.
    ModifiedByInstructions,
}

impl Tag {
    pub fn suffix(self) -> &'static str {
        match self {
            Tag::AutoFixed => " (auto-fixed)",
            Tag::ModifiedByUser => " (modified by user)",
            Tag::ModifiedByInstructions => " (modified by usermodification)",
        }
    }
}

/// Description of the current code: base text plus revision tags in order.
///
/// Rendering joins the base with each tag's suffix, so the displayed text is
/// identical to appending suffixes to a plain string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    base: String,
    tags: Vec<Tag>,
}

impl Description {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            tags: Vec::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn push_tag(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.tags.is_empty()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for tag in &self.tags {
            f.write_str(tag.suffix())?;
        }
        Ok(())
    }
}

/// Immutable snapshot recorded in the history store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVersion {
    pub description: String,
    pub code: String,
    pub created_at: DateTime<Local>,
}

/// Sentinel stderr reported when execution exceeds its time budget.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out.";

/// Outcome of running a piece of code in a subprocess.
///
/// `succeeded` is true only for a normal exit with status 0. A timeout is a
/// failure whose stderr is exactly [`TIMEOUT_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    pub fn failure(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: TIMEOUT_MESSAGE.to_string(),
            timed_out: true,
        }
    }

    /// Failure for a process that could not be started or awaited.
    pub fn exception(err: impl fmt::Display) -> Self {
        Self::failure("", format!("Exception during execution: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_renders_tags_in_order() {
        let mut desc = Description::new("sort a list");
        desc.push_tag(Tag::AutoFixed);
        desc.push_tag(Tag::ModifiedByInstructions);
        desc.push_tag(Tag::ModifiedByInstructions);

        assert_eq!(
            desc.render(),
            "sort a list (auto-fixed) (modified by usermodification) (modified by usermodification)"
        );
        assert_eq!(desc.base(), "sort a list");
        assert_eq!(desc.tags().len(), 3);
    }

    #[test]
    fn default_description_is_empty() {
        let desc = Description::default();
        assert!(desc.is_empty());
        assert_eq!(desc.render(), "");
    }

    #[test]
    fn timeout_result_uses_sentinel() {
        let result = ExecutionResult::timeout();
        assert!(!result.succeeded);
        assert!(result.timed_out);
        assert_eq!(result.stderr, TIMEOUT_MESSAGE);
    }
}
