//! Marked paths of one panel

use std::collections::BTreeSet;

/// Ordered set of absolute paths marked in a panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    paths: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a path; returns false if it was already marked
    pub fn insert(&mut self, path: String) -> bool {
        self.paths.insert(path)
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Snapshot of the marked paths, in order
    pub fn to_vec(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }
}
