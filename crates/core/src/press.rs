//! Detection of rapid repeated presses of a single key.
//!
//! A press is a down transition that follows an up transition. Auto-repeat
//! down events produced while the key is physically held are ignored, so
//! holding the key never counts as more than one press.

use crate::snap::SnapParams;
use crate::{KeyTransition, ModifierQuery};
use std::time::{Duration, Instant};
use tracing::debug;

/// Emitted when the configured number of presses lands inside the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCompleted {
    /// Whether the restore modifier was held at the moment of completion.
    pub secondary_held: bool,
}

/// Rolling-window press counter for the watched key.
#[derive(Debug, Default)]
pub struct PressSequenceDetector {
    held: bool,
    presses: Vec<Instant>,
    /// Press count the current record was collected under.
    required: u32,
}

impl PressSequenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transition of the watched key.
    ///
    /// Transitions of other keys and all transitions while the feature is
    /// disabled are ignored entirely.
    pub fn on_transition(
        &mut self,
        transition: KeyTransition,
        params: &SnapParams,
        modifiers: &impl ModifierQuery,
    ) -> Option<SequenceCompleted> {
        if !params.enabled || transition.key != params.hotkey {
            return None;
        }

        if !transition.is_down {
            self.held = false;
            return None;
        }

        if self.held {
            return None;
        }
        self.held = true;

        let required = params.presses.max(1);
        if required != self.required {
            self.presses.clear();
            self.required = required;
        }

        let now = transition.at;
        let interval = params.interval;
        self.presses
            .retain(|&t| now.saturating_duration_since(t) <= interval);
        self.presses.push(now);
        debug!("{} press {}/{}", params.hotkey, self.presses.len(), required);

        if self.presses.len() as u32 >= required {
            self.presses.clear();
            let secondary_held = modifiers.is_held(params.restore_modifier);
            return Some(SequenceCompleted { secondary_held });
        }
        None
    }

    /// Number of presses currently inside the window.
    pub fn pending_presses(&self) -> usize {
        self.presses.len()
    }

    /// Whether the watched key is currently considered held.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Forget all recorded presses and the held flag.
    pub fn reset(&mut self) {
        self.held = false;
        self.presses.clear();
    }
}

/// Convert a millisecond interval into a non-zero duration.
pub fn interval_from_millis(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyName;
    use std::cell::Cell;

    struct FakeModifiers {
        ctrl: Cell<bool>,
    }

    impl FakeModifiers {
        fn new() -> Self {
            Self { ctrl: Cell::new(false) }
        }
    }

    impl ModifierQuery for FakeModifiers {
        fn is_held(&self, key: KeyName) -> bool {
            key == KeyName::Ctrl && self.ctrl.get()
        }
    }

    fn params() -> SnapParams {
        SnapParams {
            presses: 3,
            interval: Duration::from_millis(1050),
            ..SnapParams::default()
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn down(base: Instant, ms: u64) -> KeyTransition {
        KeyTransition {
            key: KeyName::LeftShift,
            is_down: true,
            at: at(base, ms),
        }
    }

    fn up(base: Instant, ms: u64) -> KeyTransition {
        KeyTransition {
            key: KeyName::LeftShift,
            is_down: false,
            at: at(base, ms),
        }
    }

    /// Press and release at `ms`, returning the completion of the press.
    fn tap(
        detector: &mut PressSequenceDetector,
        base: Instant,
        ms: u64,
        params: &SnapParams,
        modifiers: &FakeModifiers,
    ) -> Option<SequenceCompleted> {
        let result = detector.on_transition(down(base, ms), params, modifiers);
        detector.on_transition(up(base, ms + 30), params, modifiers);
        result
    }

    #[test]
    fn test_three_presses_within_interval_complete_once() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = params();
        let base = Instant::now();

        assert_eq!(tap(&mut detector, base, 0, &params, &modifiers), None);
        assert_eq!(tap(&mut detector, base, 500, &params, &modifiers), None);
        assert_eq!(
            tap(&mut detector, base, 1000, &params, &modifiers),
            Some(SequenceCompleted { secondary_held: false })
        );
        assert_eq!(detector.pending_presses(), 0);

        // Counting restarts immediately after completion
        assert_eq!(tap(&mut detector, base, 1100, &params, &modifiers), None);
        assert_eq!(detector.pending_presses(), 1);
    }

    #[test]
    fn test_held_key_counts_once() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = params();
        let base = Instant::now();

        for ms in (0..1000).step_by(33) {
            assert_eq!(detector.on_transition(down(base, ms), &params, &modifiers), None);
        }
        assert_eq!(detector.pending_presses(), 1);
        assert!(detector.is_held());

        detector.on_transition(up(base, 1000), &params, &modifiers);
        assert!(!detector.is_held());
    }

    #[test]
    fn test_presses_outside_window_do_not_combine() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = SnapParams {
            presses: 2,
            ..params()
        };
        let base = Instant::now();

        assert_eq!(tap(&mut detector, base, 0, &params, &modifiers), None);
        assert_eq!(tap(&mut detector, base, 1100, &params, &modifiers), None);
        assert_eq!(detector.pending_presses(), 1);
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = SnapParams {
            presses: 2,
            ..params()
        };
        let base = Instant::now();

        assert_eq!(tap(&mut detector, base, 0, &params, &modifiers), None);
        assert!(tap(&mut detector, base, 1050, &params, &modifiers).is_some());
    }

    #[test]
    fn test_secondary_modifier_reported() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = params();
        let base = Instant::now();

        tap(&mut detector, base, 0, &params, &modifiers);
        tap(&mut detector, base, 200, &params, &modifiers);
        modifiers.ctrl.set(true);
        assert_eq!(
            tap(&mut detector, base, 400, &params, &modifiers),
            Some(SequenceCompleted { secondary_held: true })
        );
    }

    #[test]
    fn test_disabled_ignores_everything() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = SnapParams {
            enabled: false,
            ..params()
        };
        let base = Instant::now();

        for ms in [0, 100, 200, 300] {
            assert_eq!(tap(&mut detector, base, ms, &params, &modifiers), None);
        }
        assert_eq!(detector.pending_presses(), 0);
        assert!(!detector.is_held());
    }

    #[test]
    fn test_other_keys_ignored() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = params();
        let base = Instant::now();

        let other = KeyTransition {
            key: KeyName::RightShift,
            is_down: true,
            at: base,
        };
        assert_eq!(detector.on_transition(other, &params, &modifiers), None);
        assert_eq!(detector.pending_presses(), 0);
    }

    #[test]
    fn test_single_press_sequence() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let params = SnapParams {
            presses: 1,
            ..params()
        };
        let base = Instant::now();

        assert!(tap(&mut detector, base, 0, &params, &modifiers).is_some());
        assert!(tap(&mut detector, base, 10, &params, &modifiers).is_some());
    }

    #[test]
    fn test_record_never_exceeds_required_after_change() {
        let mut detector = PressSequenceDetector::new();
        let modifiers = FakeModifiers::new();
        let base = Instant::now();
        let five = SnapParams {
            presses: 5,
            ..params()
        };

        for ms in [0, 100, 200, 300] {
            tap(&mut detector, base, ms, &five, &modifiers);
        }
        assert_eq!(detector.pending_presses(), 4);

        // Lowering the requirement drops the old record instead of firing
        let three = params();
        assert_eq!(tap(&mut detector, base, 400, &three, &modifiers), None);
        assert_eq!(detector.pending_presses(), 1);
    }

    #[test]
    fn test_interval_from_millis_never_zero() {
        assert_eq!(interval_from_millis(0), Duration::from_millis(1));
        assert_eq!(interval_from_millis(1050), Duration::from_millis(1050));
    }
}
