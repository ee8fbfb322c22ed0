//! Ordered record of the changes made by one pass.

use serde::{Deserialize, Serialize};

/// Change descriptions in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSummary {
    entries: Vec<String>,
}

impl ChangeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Whether anything changed
    pub fn changed(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.iter().any(|e| e == message)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}

impl From<Vec<String>> for ChangeSummary {
    fn from(entries: Vec<String>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed() {
        let mut summary = ChangeSummary::new();
        assert!(!summary.changed());
        summary.push("Removing instance i1");
        assert!(summary.changed());
        assert!(summary.contains("Removing instance i1"));
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut a = ChangeSummary::from(vec!["one".to_string()]);
        a.merge(ChangeSummary::from(vec!["two".to_string()]));
        assert_eq!(a.into_vec(), vec!["one", "two"]);
    }

    #[test]
    fn test_serializes_as_list() {
        let summary = ChangeSummary::from(vec!["x".to_string()]);
        assert_eq!(serde_json::to_string(&summary).unwrap(), r#"["x"]"#);
    }
}
