//! Panel data structures and logic

use std::cmp::Ordering;

use super::{SelectionSet, Side};
use crate::errors::VfsResult;
use crate::fs::Entry;
use crate::providers::SharedView;

/// Sort a listing for display: directories first, then case-insensitive name
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });
}

/// A single file panel bound to one filesystem view
pub struct Panel {
    pub side: Side,
    /// Last listing of the current directory, in display order
    pub entries: Vec<Entry>,
    /// Error message if the directory couldn't be read
    pub error: Option<String>,
    /// Marked paths, absolute in this panel's view
    pub selection: SelectionSet,
    /// Show hidden files (starting with .)
    pub show_hidden: bool,
    view: SharedView,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("side", &self.side)
            .field("view", &self.view.label())
            .field("path", &self.view.current_directory())
            .field("entries", &self.entries.len())
            .field("selected", &self.selection.len())
            .finish()
    }
}

impl Panel {
    /// Create a panel and read its first listing
    pub fn new(side: Side, view: SharedView, show_hidden: bool) -> Self {
        let mut panel = Self {
            side,
            entries: Vec::new(),
            error: None,
            selection: SelectionSet::new(),
            show_hidden,
            view,
        };
        panel.refresh();
        panel
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    /// Replace the view wholesale; the previous one is dropped here unless a
    /// running batch still holds it
    pub fn rebind(&mut self, view: SharedView) {
        log::debug!("{:?} panel: {} -> {}", self.side, self.view.label(), view.label());
        self.view = view;
        self.selection.clear();
        self.refresh();
    }

    pub fn current_directory(&self) -> String {
        self.view.current_directory()
    }

    /// Refresh directory contents
    pub fn refresh(&mut self) {
        let path = self.view.current_directory();
        match self.view.list_directory(&path) {
            Ok(entries) => {
                self.entries = if self.show_hidden {
                    entries
                } else {
                    entries.into_iter().filter(|e| !e.is_hidden()).collect()
                };
                sort_entries(&mut self.entries);
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.entries.clear();
            }
        }
    }

    /// Change to a new directory through the view.
    ///
    /// On failure the panel keeps its listing and the error is returned.
    pub fn change_directory(&mut self, path: &str) -> VfsResult<()> {
        let before = self.view.current_directory();
        self.view.change_directory(path)?;
        if self.view.current_directory() != before {
            self.selection.clear();
        }
        self.refresh();
        Ok(())
    }

    /// Mark a path, resolved against the current directory
    pub fn select(&mut self, path: &str) -> bool {
        let path = self.view.resolve(path);
        self.selection.insert(path)
    }

    pub fn unselect(&mut self, path: &str) -> bool {
        let path = self.view.resolve(path);
        self.selection.remove(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalView;
    use std::fs;
    use std::sync::Arc;

    fn fixture_with(show_hidden: bool) -> (tempfile::TempDir, Panel) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();
        fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        fs::write(dir.path().join("A.txt"), b"a").unwrap();
        fs::write(dir.path().join(".hidden"), b"h").unwrap();
        let view: SharedView = Arc::new(LocalView::new(dir.path().to_path_buf()));
        let panel = Panel::new(Side::Left, view, show_hidden);
        (dir, panel)
    }

    fn fixture() -> (tempfile::TempDir, Panel) {
        fixture_with(true)
    }

    fn names(panel: &Panel) -> Vec<&str> {
        panel.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_listing_order_dirs_first() {
        let (_dir, panel) = fixture();
        assert_eq!(names(&panel), vec!["Alpha", "zeta", ".hidden", "A.txt", "b.txt"]);
    }

    #[test]
    fn test_hidden_filter() {
        let (_dir, mut panel) = fixture_with(false);
        assert_eq!(names(&panel), vec!["Alpha", "zeta", "A.txt", "b.txt"]);
        panel.show_hidden = true;
        panel.refresh();
        assert!(names(&panel).contains(&".hidden"));
    }

    #[test]
    fn test_failed_change_directory_keeps_state() {
        let (_dir, mut panel) = fixture();
        panel.select("b.txt");
        let before = panel.current_directory();

        assert!(panel.change_directory("missing").unwrap_err().is_not_found());
        assert_eq!(panel.current_directory(), before);
        assert_eq!(panel.entries.len(), 5);
        assert_eq!(panel.selection.len(), 1);

        panel.change_directory("zeta").unwrap();
        assert!(panel.entries.is_empty());
        assert!(panel.selection.is_empty());
    }

    #[test]
    fn test_select_resolves_against_current_directory() {
        let (dir, mut panel) = fixture();
        assert!(panel.select("A.txt"));
        assert!(panel.selection.contains(&dir.path().join("A.txt").to_string_lossy()));
        assert!(panel.unselect(&dir.path().join("A.txt").to_string_lossy()));
        assert!(panel.selection.is_empty());
    }

    #[test]
    fn test_rebind_clears_selection() {
        let (dir, mut panel) = fixture();
        panel.select("b.txt");
        panel.rebind(Arc::new(LocalView::new(dir.path().join("Alpha"))));
        assert!(panel.selection.is_empty());
        assert!(panel.current_directory().ends_with("Alpha"));
    }
}
