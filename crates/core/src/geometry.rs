//! Captured window geometry and monitor-relative centering.

use crate::{Rect, WindowIdentity};
use std::collections::HashMap;

/// Remembers the pre-snap rectangle of each window identity.
///
/// Entries live for the process lifetime. A capture never replaces an
/// existing entry.
#[derive(Debug, Default)]
pub struct GeometryStore {
    captured: HashMap<WindowIdentity, Rect>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rect` for `identity` unless an entry already exists.
    ///
    /// Returns true if the rectangle was stored.
    pub fn capture_if_absent(&mut self, identity: &WindowIdentity, rect: Rect) -> bool {
        if self.captured.contains_key(identity) {
            return false;
        }
        self.captured.insert(identity.clone(), rect);
        true
    }

    pub fn get(&self, identity: &WindowIdentity) -> Option<Rect> {
        self.captured.get(identity).copied()
    }

    pub fn contains(&self, identity: &WindowIdentity) -> bool {
        self.captured.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.captured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }
}

/// Center a `width` x `height` rectangle on `monitor`.
///
/// The offset is floor-divided, so an odd leftover pixel goes to the
/// right/bottom side, and a window larger than the monitor overhangs
/// symmetrically with the extra pixel on the left/top.
pub fn center_in(monitor: Rect, width: i32, height: i32) -> Rect {
    Rect::new(
        monitor.x + (monitor.width - width).div_euclid(2),
        monitor.y + (monitor.height - height).div_euclid(2),
        width,
        height,
    )
}

/// Size a rectangle to a percentage of `monitor` and center it there.
///
/// Dimensions are truncated toward zero.
pub fn scaled_centered(monitor: Rect, width_pct: u32, height_pct: u32) -> Rect {
    let width = scale(monitor.width, width_pct);
    let height = scale(monitor.height, height_pct);
    center_in(monitor, width, height)
}

fn scale(dimension: i32, pct: u32) -> i32 {
    (i64::from(dimension) * i64::from(pct) / 100) as i32
}
