//! WinToolbox Core
//!
//! Platform-agnostic logic for the two WinToolbox behaviors:
//! - Press-sequence detection and window snap/restore
//! - Explorer view enforcement driven by a periodic poll
//!
//! Everything the core needs from the operating system is expressed as a
//! capability trait ([`WindowOps`], [`ModifierQuery`], [`KeystrokeInjector`],
//! [`explorer::BrowserAutomation`]). The Win32 implementations live in the
//! platform crate; tests use in-memory fakes.

pub mod explorer;
pub mod folder;
pub mod geometry;
pub mod press;
pub mod snap;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

pub use explorer::{
    BrowserAutomation, BrowserWindow, CycleReport, ExplorerParams, ExplorerPollLoop, GroupBy,
    NudgePolicy, ViewMode,
};
pub use folder::FolderChangeTracker;
pub use geometry::{center_in, scaled_centered, GeometryStore};
pub use press::{PressSequenceDetector, SequenceCompleted};
pub use snap::{SkipReason, SnapOutcome, SnapParams, SnapRestoreController};

/// Opaque top-level window handle.
/// On Windows, this is the HWND cast to u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rectangle from left/top/right/bottom edges.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Derived identity of a top-level window used for geometry bookkeeping.
///
/// This is an approximation, not a unique id: a title change makes the
/// window look like a new one, and a reused process id can collide with an
/// old entry. Both cases are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowIdentity {
    pub process_id: u32,
    pub class_name: String,
    pub title: String,
}

impl WindowIdentity {
    pub fn new(process_id: u32, class_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            process_id,
            class_name: class_name.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for WindowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.process_id, self.class_name, self.title)
    }
}

/// Symbolic key names accepted for the watched key and the restore modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyName {
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    /// Either shift key.
    Shift,
    /// Either control key.
    Ctrl,
    /// Either alt key.
    Alt,
    A,
    B,
    C,
}

impl KeyName {
    /// All recognized key names, in display order.
    pub const ALL: [KeyName; 12] = [
        KeyName::LeftShift,
        KeyName::RightShift,
        KeyName::LeftCtrl,
        KeyName::RightCtrl,
        KeyName::LeftAlt,
        KeyName::RightAlt,
        KeyName::Shift,
        KeyName::Ctrl,
        KeyName::Alt,
        KeyName::A,
        KeyName::B,
        KeyName::C,
    ];

    /// The symbolic name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyName::LeftShift => "Left Shift",
            KeyName::RightShift => "Right Shift",
            KeyName::LeftCtrl => "Left Ctrl",
            KeyName::RightCtrl => "Right Ctrl",
            KeyName::LeftAlt => "Left Alt",
            KeyName::RightAlt => "Right Alt",
            KeyName::Shift => "Shift",
            KeyName::Ctrl => "Ctrl",
            KeyName::Alt => "Alt",
            KeyName::A => "A",
            KeyName::B => "B",
            KeyName::C => "C",
        }
    }

    /// Parse a symbolic key name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw down/up transition of the watched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyName,
    pub is_down: bool,
    pub at: Instant,
}

/// Failures reported by OS capabilities.
///
/// None of these are fatal: callers log them and skip the affected step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Window {0} no longer exists")]
    WindowGone(WindowHandle),

    #[error("No monitor found for window {0}")]
    NoMonitor(WindowHandle),

    #[error("Property {0} rejected by folder view")]
    PropertyRejected(String),

    #[error("{api} failed: {message}")]
    Call { api: &'static str, message: String },

    #[error("Not supported on this platform")]
    Unsupported,
}

impl PlatformError {
    /// Shorthand for a failed OS call.
    pub fn call(api: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            api,
            message: message.into(),
        }
    }
}

/// Query the instantaneous held state of a key.
pub trait ModifierQuery {
    fn is_held(&self, key: KeyName) -> bool;
}

/// Inject synthetic keystrokes.
pub trait KeystrokeInjector {
    /// Send the Explorer "autosize columns" chord (Ctrl + numeric keypad Add).
    fn send_zoom_nudge(&self) -> Result<(), PlatformError>;
}

/// Query the current foreground window.
pub trait ForegroundQuery {
    fn foreground_window(&self) -> Option<WindowHandle>;
}

/// Window geometry and state operations.
pub trait WindowOps: ForegroundQuery {
    fn is_maximized(&self, window: WindowHandle) -> bool;
    fn restore_from_maximized(&self, window: WindowHandle) -> Result<(), PlatformError>;
    fn window_rect(&self, window: WindowHandle) -> Result<Rect, PlatformError>;
    fn move_window(&self, window: WindowHandle, rect: Rect) -> Result<(), PlatformError>;
    fn window_identity(&self, window: WindowHandle) -> Result<WindowIdentity, PlatformError>;
    /// Bounding rectangle of the monitor the window currently occupies.
    fn monitor_rect(&self, window: WindowHandle) -> Result<Rect, PlatformError>;
}
