//! Snap the foreground window to a centered, percentage-sized rectangle and
//! restore it to the size it had before its first snap.

use crate::geometry::{center_in, scaled_centered, GeometryStore};
use crate::press::SequenceCompleted;
use crate::{KeyName, Rect, WindowHandle, WindowOps};
use std::time::Duration;
use tracing::{debug, info};

/// Snap/restore parameters taken from one configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapParams {
    pub enabled: bool,
    /// Key whose repeated presses trigger the action.
    pub hotkey: KeyName,
    /// Presses required inside `interval`.
    pub presses: u32,
    pub interval: Duration,
    pub width_pct: u32,
    pub height_pct: u32,
    /// Modifier that turns a completed sequence into a restore.
    pub restore_modifier: KeyName,
}

impl Default for SnapParams {
    fn default() -> Self {
        Self {
            enabled: true,
            hotkey: KeyName::LeftShift,
            presses: 3,
            interval: Duration::from_millis(1050),
            width_pct: 76,
            height_pct: 76,
            restore_modifier: KeyName::Ctrl,
        }
    }
}

/// Why a snap or restore did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoForegroundWindow,
    WindowUnreadable,
    NoMonitor,
    NothingCaptured,
}

/// Result of handling one completed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapOutcome {
    Snapped(Rect),
    Restored(Rect),
    Skipped(SkipReason),
}

/// Applies snap and restore-original to the foreground window.
#[derive(Debug, Default)]
pub struct SnapRestoreController {
    store: GeometryStore,
}

impl SnapRestoreController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a completed sequence: restore when the secondary modifier
    /// was held, snap otherwise.
    pub fn handle(
        &mut self,
        signal: SequenceCompleted,
        params: &SnapParams,
        ops: &impl WindowOps,
    ) -> SnapOutcome {
        let outcome = if signal.secondary_held {
            self.restore_original(ops)
        } else {
            self.snap(params, ops)
        };
        match outcome {
            SnapOutcome::Snapped(rect) => info!("Snapped foreground window to {:?}", rect),
            SnapOutcome::Restored(rect) => info!("Restored foreground window to {:?}", rect),
            SnapOutcome::Skipped(reason) => debug!("Snap/restore skipped: {:?}", reason),
        }
        outcome
    }

    /// Resize the foreground window to the configured percentage of its
    /// monitor and center it there.
    pub fn snap(&mut self, params: &SnapParams, ops: &impl WindowOps) -> SnapOutcome {
        let Some(window) = ops.foreground_window() else {
            return SnapOutcome::Skipped(SkipReason::NoForegroundWindow);
        };
        unmaximize(ops, window);

        let identity = match ops.window_identity(window) {
            Ok(identity) => identity,
            Err(e) => {
                debug!("Cannot identify window {}: {}", window, e);
                return SnapOutcome::Skipped(SkipReason::WindowUnreadable);
            }
        };

        if !self.store.contains(&identity) {
            match ops.window_rect(window) {
                Ok(rect) => {
                    self.store.capture_if_absent(&identity, rect);
                    debug!("Captured original geometry of {}: {:?}", identity, rect);
                }
                Err(e) => {
                    debug!("Cannot read rect of window {}: {}", window, e);
                    return SnapOutcome::Skipped(SkipReason::WindowUnreadable);
                }
            }
        }

        let monitor = match ops.monitor_rect(window) {
            Ok(monitor) => monitor,
            Err(e) => {
                debug!("Cannot resolve monitor of window {}: {}", window, e);
                return SnapOutcome::Skipped(SkipReason::NoMonitor);
            }
        };

        let target = scaled_centered(monitor, params.width_pct, params.height_pct);
        apply(ops, window, target);
        SnapOutcome::Snapped(target)
    }

    /// Return the foreground window to its captured size, centered on the
    /// monitor it currently occupies.
    pub fn restore_original(&mut self, ops: &impl WindowOps) -> SnapOutcome {
        let Some(window) = ops.foreground_window() else {
            return SnapOutcome::Skipped(SkipReason::NoForegroundWindow);
        };
        unmaximize(ops, window);

        let identity = match ops.window_identity(window) {
            Ok(identity) => identity,
            Err(e) => {
                debug!("Cannot identify window {}: {}", window, e);
                return SnapOutcome::Skipped(SkipReason::WindowUnreadable);
            }
        };

        let Some(original) = self.store.get(&identity) else {
            return SnapOutcome::Skipped(SkipReason::NothingCaptured);
        };

        let monitor = match ops.monitor_rect(window) {
            Ok(monitor) => monitor,
            Err(e) => {
                debug!("Cannot resolve monitor of window {}: {}", window, e);
                return SnapOutcome::Skipped(SkipReason::NoMonitor);
            }
        };

        let target = center_in(monitor, original.width, original.height);
        apply(ops, window, target);
        SnapOutcome::Restored(target)
    }

    /// Captured geometry, keyed by window identity.
    pub fn store(&self) -> &GeometryStore {
        &self.store
    }
}

fn unmaximize(ops: &impl WindowOps, window: WindowHandle) {
    if ops.is_maximized(window) {
        if let Err(e) = ops.restore_from_maximized(window) {
            debug!("Failed to unmaximize window {}: {}", window, e);
        }
    }
}

fn apply(ops: &impl WindowOps, window: WindowHandle, target: Rect) {
    if let Err(e) = ops.move_window(window, target) {
        debug!("Failed to move window {}: {}", window, e);
    }
}
