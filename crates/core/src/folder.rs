//! Per-window folder path tracking for the one-shot Explorer nudge.

use crate::WindowHandle;
use std::collections::HashMap;

/// Remembers the last folder path seen in each browser window.
///
/// Entries for closed windows are never collected; a dead handle simply
/// stops being observed.
#[derive(Debug, Default)]
pub struct FolderChangeTracker {
    last_paths: HashMap<WindowHandle, String>,
}

impl FolderChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current path of `window` and report whether it changed.
    ///
    /// - `None` or an empty path is a failed read: nothing is recorded.
    /// - The first path seen for a window is recorded but is not a change.
    /// - Otherwise a change is an exact string difference.
    pub fn observe(&mut self, window: WindowHandle, current_path: Option<&str>) -> bool {
        let Some(path) = current_path.filter(|p| !p.is_empty()) else {
            return false;
        };

        match self.last_paths.get_mut(&window) {
            None => {
                self.last_paths.insert(window, path.to_string());
                false
            }
            Some(last) if last.as_str() == path => false,
            Some(last) => {
                *last = path.to_string();
                true
            }
        }
    }

    /// The last recorded path of `window`.
    pub fn last_path(&self, window: WindowHandle) -> Option<&str> {
        self.last_paths.get(&window).map(String::as_str)
    }

    /// Forget all windows.
    pub fn clear(&mut self) {
        self.last_paths.clear();
    }

    pub fn len(&self) -> usize {
        self.last_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W1: WindowHandle = WindowHandle(1);
    const W2: WindowHandle = WindowHandle(2);

    #[test]
    fn test_first_observation_is_not_a_change() {
        let mut tracker = FolderChangeTracker::new();
        assert!(!tracker.observe(W1, Some(r"C:\Users")));
        assert_eq!(tracker.last_path(W1), Some(r"C:\Users"));
    }

    #[test]
    fn test_change_reported_once() {
        let mut tracker = FolderChangeTracker::new();
        tracker.observe(W1, Some(r"C:\Users"));

        assert!(tracker.observe(W1, Some(r"C:\Windows")));
        assert!(!tracker.observe(W1, Some(r"C:\Windows")));
    }

    #[test]
    fn test_exact_comparison() {
        let mut tracker = FolderChangeTracker::new();
        tracker.observe(W1, Some(r"C:\Users"));
        // Case differs: still a change
        assert!(tracker.observe(W1, Some(r"C:\USERS")));
    }

    #[test]
    fn test_failed_read_is_not_a_change() {
        let mut tracker = FolderChangeTracker::new();
        tracker.observe(W1, Some(r"C:\Users"));

        assert!(!tracker.observe(W1, None));
        assert!(!tracker.observe(W1, Some("")));
        assert_eq!(tracker.last_path(W1), Some(r"C:\Users"));

        // Returning to the same folder after a failed read is not a change
        assert!(!tracker.observe(W1, Some(r"C:\Users")));
    }

    #[test]
    fn test_failed_first_read_records_nothing() {
        let mut tracker = FolderChangeTracker::new();
        assert!(!tracker.observe(W1, None));
        assert!(tracker.is_empty());
        assert!(!tracker.observe(W1, Some(r"D:\")));
    }

    #[test]
    fn test_windows_tracked_independently() {
        let mut tracker = FolderChangeTracker::new();
        tracker.observe(W1, Some(r"C:\A"));
        tracker.observe(W2, Some(r"C:\B"));

        assert!(!tracker.observe(W2, Some(r"C:\B")));
        assert!(tracker.observe(W1, Some(r"C:\B")));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_clear_resets_first_observation() {
        let mut tracker = FolderChangeTracker::new();
        tracker.observe(W1, Some(r"C:\A"));
        tracker.clear();

        assert!(!tracker.observe(W1, Some(r"C:\B")));
    }
}
