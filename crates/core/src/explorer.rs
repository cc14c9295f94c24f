//! Periodic enforcement of Explorer view settings.
//!
//! Each poll cycle walks the open Explorer windows and applies up to two
//! independent strategies:
//!
//! - **One-shot**: when a window's folder changes while it is the
//!   foreground window, send a single autosize nudge.
//! - **Repeated**: reapply view mode, grouping and sort order, then nudge
//!   several times if the window ended up in details view.

use crate::folder::FolderChangeTracker;
use crate::{ForegroundQuery, KeystrokeInjector, PlatformError, WindowHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Explorer folder view mode (FOLDERVIEWMODE value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewMode(pub u32);

impl ViewMode {
    pub const LARGE_ICONS: ViewMode = ViewMode(1);
    pub const SMALL_ICONS: ViewMode = ViewMode(2);
    pub const LIST: ViewMode = ViewMode(3);
    pub const DETAILS: ViewMode = ViewMode(4);
    pub const TILES: ViewMode = ViewMode(5);
    pub const CONTENT: ViewMode = ViewMode(7);

    /// Modes offered for configuration.
    pub const SELECTABLE: [ViewMode; 6] = [
        ViewMode::LARGE_ICONS,
        ViewMode::SMALL_ICONS,
        ViewMode::LIST,
        ViewMode::DETAILS,
        ViewMode::TILES,
        ViewMode::CONTENT,
    ];

    pub fn is_selectable(&self) -> bool {
        Self::SELECTABLE.contains(self)
    }
}

/// Grouping applied to a folder view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    /// Disable grouping (the `System.Null` property).
    None,
    /// Group by a property given by its canonical name.
    Column(String),
}

/// Canonical name of the property that disables grouping.
pub const NO_GROUPING_PROPERTY: &str = "System.Null";

/// Fixed-count, fixed-delay repetition of the autosize nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NudgePolicy {
    pub count: u32,
    /// Pause between consecutive nudges.
    pub delay: Duration,
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self {
            count: 5,
            delay: Duration::from_millis(100),
        }
    }
}

/// Explorer parameters taken from one configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerParams {
    pub enabled: bool,
    pub view_mode: ViewMode,
    /// Canonical property name, e.g. `System.ItemNameDisplay`.
    pub sort_column: String,
    pub sort_ascending: bool,
    /// Group by the sort column instead of disabling grouping.
    pub enable_grouping: bool,
    /// Strategy B.
    pub repeated_nudge: bool,
    /// Strategy A.
    pub one_shot_nudge: bool,
    pub nudge: NudgePolicy,
}

impl Default for ExplorerParams {
    fn default() -> Self {
        Self {
            enabled: true,
            view_mode: ViewMode::DETAILS,
            sort_column: "System.ItemNameDisplay".to_string(),
            sort_ascending: true,
            enable_grouping: false,
            repeated_nudge: true,
            one_shot_nudge: true,
            nudge: NudgePolicy::default(),
        }
    }
}

impl ExplorerParams {
    /// Grouping implied by the configuration.
    pub fn group_by(&self) -> GroupBy {
        if self.enable_grouping {
            GroupBy::Column(self.sort_column.clone())
        } else {
            GroupBy::None
        }
    }
}

/// One open Explorer window.
///
/// Every operation may fail independently: some folder types reject some
/// properties, and the window can close mid-cycle.
pub trait BrowserWindow {
    fn handle(&self) -> WindowHandle;
    fn folder_path(&self) -> Result<String, PlatformError>;
    fn view_mode(&self) -> Result<ViewMode, PlatformError>;
    fn set_view_mode(&self, mode: ViewMode) -> Result<(), PlatformError>;
    fn set_group_by(&self, group: &GroupBy) -> Result<(), PlatformError>;
    fn set_sort(&self, column: &str, ascending: bool) -> Result<(), PlatformError>;
    fn refresh(&self) -> Result<(), PlatformError>;
}

/// Enumerates open Explorer windows.
pub trait BrowserAutomation {
    type Window: BrowserWindow;

    fn browser_windows(&self) -> Result<Vec<Self::Window>, PlatformError>;
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub windows: usize,
    pub folder_changes: usize,
    pub one_shot_nudges: usize,
    pub repeated_nudges: usize,
    pub failed_steps: usize,
}

/// Explorer poll state. Owned by the poll context only.
pub struct ExplorerPollLoop<B, K> {
    automation: B,
    keys: K,
    tracker: FolderChangeTracker,
    enabled: bool,
}

impl<B, K> ExplorerPollLoop<B, K>
where
    B: BrowserAutomation,
    K: KeystrokeInjector,
{
    pub fn new(automation: B, keys: K) -> Self {
        Self {
            automation,
            keys,
            tracker: FolderChangeTracker::new(),
            enabled: false,
        }
    }

    /// Track feature enablement. Turning the feature off forgets all
    /// folder state so re-enabling starts from first observations.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            info!("Explorer view manager disabled, clearing {} tracked folders", self.tracker.len());
            self.tracker.clear();
        }
        self.enabled = enabled;
    }

    /// Run one poll cycle against the current snapshot.
    pub fn run_cycle(
        &mut self,
        params: &ExplorerParams,
        foreground: &impl ForegroundQuery,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        self.set_enabled(params.enabled);
        if !params.enabled {
            return report;
        }
        if !params.one_shot_nudge && !self.tracker.is_empty() {
            self.tracker.clear();
        }
        if !params.one_shot_nudge && !params.repeated_nudge {
            return report;
        }

        let windows = match self.automation.browser_windows() {
            Ok(windows) => windows,
            Err(e) => {
                debug!("Cannot enumerate Explorer windows: {}", e);
                return report;
            }
        };
        report.windows = windows.len();

        for window in &windows {
            if params.one_shot_nudge {
                self.one_shot(window, foreground, &mut report);
            }
            if params.repeated_nudge {
                self.repeated(window, params, &mut report);
            }
        }

        report
    }

    fn one_shot(
        &mut self,
        window: &B::Window,
        foreground: &impl ForegroundQuery,
        report: &mut CycleReport,
    ) {
        let handle = window.handle();
        let path = match window.folder_path() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Cannot read folder of Explorer window {}: {}", handle, e);
                report.failed_steps += 1;
                None
            }
        };

        if !self.tracker.observe(handle, path.as_deref()) {
            return;
        }
        report.folder_changes += 1;
        debug!("Explorer window {} changed folder to {:?}", handle, path);

        if foreground.foreground_window() != Some(handle) {
            return;
        }
        match self.keys.send_zoom_nudge() {
            Ok(()) => report.one_shot_nudges += 1,
            Err(e) => {
                debug!("One-shot nudge failed: {}", e);
                report.failed_steps += 1;
            }
        }
    }

    fn repeated(&self, window: &B::Window, params: &ExplorerParams, report: &mut CycleReport) {
        let handle = window.handle();

        if let Err(e) = window.set_view_mode(params.view_mode) {
            debug!("Explorer window {}: set view mode failed: {}", handle, e);
            report.failed_steps += 1;
        }
        if let Err(e) = window.set_group_by(&params.group_by()) {
            debug!("Explorer window {}: set grouping failed: {}", handle, e);
            report.failed_steps += 1;
        }
        if let Err(e) = window.set_sort(&params.sort_column, params.sort_ascending) {
            debug!("Explorer window {}: set sort failed: {}", handle, e);
            report.failed_steps += 1;
        }

        let mode = match window.view_mode() {
            Ok(mode) => Some(mode),
            Err(e) => {
                debug!("Explorer window {}: read view mode failed: {}", handle, e);
                report.failed_steps += 1;
                None
            }
        };
        if mode == Some(ViewMode::DETAILS) {
            report.repeated_nudges += self.nudge_repeatedly(params.nudge);
        }

        if let Err(e) = window.refresh() {
            debug!("Explorer window {}: refresh failed: {}", handle, e);
            report.failed_steps += 1;
        }
    }

    /// Send the nudge `policy.count` times, pausing between attempts.
    /// Returns the number of nudges that were sent.
    fn nudge_repeatedly(&self, policy: NudgePolicy) -> usize {
        let mut sent = 0;
        for attempt in 0..policy.count {
            if attempt > 0 && !policy.delay.is_zero() {
                std::thread::sleep(policy.delay);
            }
            match self.keys.send_zoom_nudge() {
                Ok(()) => sent += 1,
                Err(e) => debug!("Nudge {}/{} failed: {}", attempt + 1, policy.count, e),
            }
        }
        sent
    }

    /// Folder state of the one-shot strategy.
    pub fn tracker(&self) -> &FolderChangeTracker {
        &self.tracker
    }
}
