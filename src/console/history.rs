//! Bounded input history for recall by an external input widget.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Maximum number of lines to keep in history.
const DEFAULT_LIMIT: usize = 100;

/// Most-recent-first list of raw dispatched lines.
///
/// Every dispatched line lands here verbatim, resolved or not. Consecutive
/// identical entries are kept; recall widgets want to step through what was
/// actually typed.
pub struct InputHistory {
    limit: usize,
    lines: Mutex<VecDeque<String>>,
}

impl InputHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            lines: Mutex::new(VecDeque::with_capacity(limit.max(1))),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().expect("input history poisoned");
        lines.push_front(line.into());
        lines.truncate(self.limit);
    }

    /// Recall by recency: index 0 is the most recent line.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<String> {
        self.lines
            .lock()
            .expect("input history poisoned")
            .get(index)
            .cloned()
    }

    /// All retained lines, most recent first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("input history poisoned")
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().expect("input history poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InputHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first() {
        let history = InputHistory::new();
        history.push("first");
        history.push("second");
        assert_eq!(history.entry(0).unwrap(), "second");
        assert_eq!(history.entry(1).unwrap(), "first");
        assert!(history.entry(2).is_none());
    }

    #[test]
    fn test_consecutive_duplicates_are_kept() {
        let history = InputHistory::new();
        history.push("same");
        history.push("same");
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries(), vec!["same", "same"]);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let history = InputHistory::with_limit(3);
        for i in 0..5 {
            history.push(format!("line {i}"));
        }
        assert_eq!(history.entries(), vec!["line 4", "line 3", "line 2"]);
    }
}
