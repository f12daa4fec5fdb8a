//! Append-only log of generated code versions.

use chrono::Local;
use thiserror::Error;

use crate::core::types::CodeVersion;

/// Lookup failure for a 1-based history index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history entry #{index} not found (history has {len} entries)")]
    NotFound { index: usize, len: usize },
}

/// Ordered, append-only history. Index `i` (1-based) always names the `i`-th
/// entry ever appended; there are no removal or mutation operations.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Vec<CodeVersion>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new version stamped with the current local time.
    ///
    /// Returns the 1-based index assigned to the entry.
    pub fn append(&mut self, description: impl Into<String>, code: impl Into<String>) -> usize {
        self.entries.push(CodeVersion {
            description: description.into(),
            code: code.into(),
            created_at: Local::now(),
        });
        self.entries.len()
    }

    pub fn list(&self) -> &[CodeVersion] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Result<&CodeVersion, HistoryError> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or(HistoryError::NotFound {
                index,
                len: self.entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_sequential_indices() {
        let mut history = HistoryStore::new();
        assert_eq!(history.append("one", "1"), 1);
        assert_eq!(history.append("two", "2"), 2);
        assert_eq!(history.append("three", "3"), 3);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn indices_stay_stable_after_later_appends() {
        let mut history = HistoryStore::new();
        history.append("first", "a = 1");
        let before = history.get(1).expect("entry").clone();
        history.append("second", "a = 2");
        history.append("third", "a = 3");

        assert_eq!(history.get(1).expect("entry"), &before);
        assert_eq!(history.get(3).expect("entry").description, "third");
    }

    #[test]
    fn get_rejects_zero_and_past_end() {
        let mut history = HistoryStore::new();
        history.append("only", "x");

        assert_eq!(
            history.get(0).unwrap_err(),
            HistoryError::NotFound { index: 0, len: 1 }
        );
        assert_eq!(
            history.get(2).unwrap_err(),
            HistoryError::NotFound { index: 2, len: 1 }
        );
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut history = HistoryStore::new();
        history.append("b", "2");
        history.append("a", "1");
        let descriptions: Vec<&str> = history
            .list()
            .iter()
            .map(|entry| entry.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["b", "a"]);
    }
}
