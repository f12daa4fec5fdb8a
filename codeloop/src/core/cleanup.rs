//! Parser that reduces a raw model completion to bare code.
//!
//! Grammar, applied in order:
//!
//! ```text
//! response  := ws* preamble? body ws*
//! preamble  := ("#" comment)? opener rest-of-line     (first non-empty line only)
//! opener    := "Here is" | "Here's" | "Below is"      (case-insensitive)
//! body      := text with every fence marker removed
//! ```
//!
//! A fence marker is any run of three or more backticks, so the longer fences
//! used to nest one block inside another are covered too. A line made of a
//! fence marker plus an optional bare language tag is dropped whole. Any other fence marker is deleted where it stands and the rest of its
//! line is kept. Fences are removed before the preamble is checked, so a
//! preamble sitting above an opening fence is still recognised.

use std::sync::LazyLock;

use regex::Regex;

static PREAMBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#.*?)?(?:here is|here's|below is)").expect("preamble regex")
});

static FENCE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*`{3,}[\w+#.\-]*\s*$").expect("fence line regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`{3,}").expect("fence regex"));

/// Strip fences and an explanatory first line, returning trimmed code.
///
/// The result may be empty; callers treat that as a failed generation.
pub fn clean_response(raw: &str) -> String {
    let without_fences = strip_fences(raw);
    strip_preamble(&without_fences).trim().to_string()
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !FENCE_LINE_RE.is_match(line))
        .map(|line| FENCE_RE.replace_all(line, ""))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_preamble(text: &str) -> &str {
    let body = text.trim_start();
    let (first, rest) = body.split_once('\n').unwrap_or((body, ""));
    if PREAMBLE_RE.is_match(first) {
        rest
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_code_is_returned_trimmed() {
        assert_eq!(clean_response("\n  print('hi')\n\n"), "print('hi')");
    }

    #[test]
    fn strips_wrapping_fence_with_language_tag() {
        let raw = "```python\nx = 1\nprint(x)\n```";
        assert_eq!(clean_response(raw), "x = 1\nprint(x)");
    }

    #[test]
    fn strips_fence_without_language_tag() {
        assert_eq!(clean_response("```\nprint(1)\n```\n"), "print(1)");
    }

    #[test]
    fn strips_preamble_above_fence() {
        let raw = "Here's the code you asked for:\n```py\nprint(2)\n```";
        assert_eq!(clean_response(raw), "print(2)");
    }

    #[test]
    fn preamble_openers_are_case_insensitive() {
        for opener in ["Here is", "HERE'S", "below is"] {
            let raw = format!("{opener} a script\nprint(3)");
            assert_eq!(clean_response(&raw), "print(3)", "opener {opener}");
        }
    }

    #[test]
    fn comment_prefixed_preamble_is_removed() {
        let raw = "# Here is a solution\nprint(4)";
        assert_eq!(clean_response(raw), "print(4)");
    }

    #[test]
    fn preamble_only_recognised_on_first_line() {
        let raw = "print(5)\n# Here is a note that stays";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn fences_in_the_middle_of_text_are_removed() {
        let raw = "import os\n```\nprint(os.name)\n```python\nprint(6)";
        assert_eq!(clean_response(raw), "import os\nprint(os.name)\nprint(6)");
    }

    #[test]
    fn nested_and_unbalanced_fences_are_removed() {
        let raw = "```markdown\n```python\nprint(7)\n```\n```\n```";
        assert_eq!(clean_response(raw), "print(7)");
    }

    #[test]
    fn longer_outer_fences_are_removed() {
        let raw = "````markdown\n```python\nprint(7)\n```\n````";
        assert_eq!(clean_response(raw), "print(7)");

        let raw = "`````\nprint(`x`)\n`````";
        assert_eq!(clean_response(raw), "print(`x`)");
        assert_eq!(clean_response("print(10)````"), "print(10)");
    }

    #[test]
    fn inline_fence_marker_is_deleted_in_place() {
        assert_eq!(clean_response("print(8)```"), "print(8)");
        assert_eq!(clean_response("```print(9)"), "print(9)");
    }

    #[test]
    fn indented_fence_lines_are_dropped() {
        let raw = "    ```c++\nint main() {}\n    ```";
        assert_eq!(clean_response(raw), "int main() {}");
    }

    #[test]
    fn preamble_with_nothing_else_is_empty() {
        assert_eq!(clean_response("Here is nothing useful."), "");
        assert_eq!(clean_response("```\n```"), "");
        assert_eq!(clean_response(""), "");
    }

    #[test]
    fn interior_blank_lines_are_preserved() {
        let raw = "```\ndef f():\n    return 1\n\n\nprint(f())\n```";
        assert_eq!(clean_response(raw), "def f():\n    return 1\n\n\nprint(f())");
    }
}
