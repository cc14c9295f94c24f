//! Virtual-key mapping for symbolic key names.

use wintoolbox_core::KeyName;

pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LCONTROL: u16 = 0xA2;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_LMENU: u16 = 0xA4;
pub const VK_RMENU: u16 = 0xA5;

const WM_KEYDOWN: u32 = 0x0100;
const WM_KEYUP: u32 = 0x0101;
const WM_SYSKEYDOWN: u32 = 0x0104;
const WM_SYSKEYUP: u32 = 0x0105;

/// Virtual-key codes that count as `key`.
///
/// Generic modifier names match either side. The low-level hook only ever
/// reports the sided codes, so the generic `VK_SHIFT`-style codes are not
/// listed.
pub fn vk_codes(key: KeyName) -> &'static [u16] {
    match key {
        KeyName::LeftShift => &[VK_LSHIFT],
        KeyName::RightShift => &[VK_RSHIFT],
        KeyName::LeftCtrl => &[VK_LCONTROL],
        KeyName::RightCtrl => &[VK_RCONTROL],
        KeyName::LeftAlt => &[VK_LMENU],
        KeyName::RightAlt => &[VK_RMENU],
        KeyName::Shift => &[VK_LSHIFT, VK_RSHIFT],
        KeyName::Ctrl => &[VK_LCONTROL, VK_RCONTROL],
        KeyName::Alt => &[VK_LMENU, VK_RMENU],
        KeyName::A => &[0x41],
        KeyName::B => &[0x42],
        KeyName::C => &[0x43],
    }
}

/// Decide whether a low-level keyboard event is a transition of `watched`.
///
/// Returns `Some(true)` for a down transition, `Some(false)` for an up
/// transition and `None` for everything else. Injected events never count,
/// so keystrokes we synthesize cannot be mistaken for presses.
pub fn classify_key_event(watched: KeyName, vk_code: u32, message: u32, injected: bool) -> Option<bool> {
    if injected {
        return None;
    }
    let vk = u16::try_from(vk_code).ok()?;
    if !vk_codes(watched).contains(&vk) {
        return None;
    }
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(true),
        WM_KEYUP | WM_SYSKEYUP => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sided_keys_map_to_one_code() {
        assert_eq!(vk_codes(KeyName::LeftShift), &[0xA0]);
        assert_eq!(vk_codes(KeyName::RightCtrl), &[0xA3]);
        assert_eq!(vk_codes(KeyName::A), &[0x41]);
    }

    #[test]
    fn test_generic_keys_map_to_both_sides() {
        assert_eq!(vk_codes(KeyName::Ctrl), &[VK_LCONTROL, VK_RCONTROL]);
        assert_eq!(vk_codes(KeyName::Alt), &[VK_LMENU, VK_RMENU]);
    }

    #[test]
    fn test_every_key_has_a_code() {
        for key in KeyName::ALL {
            assert!(!vk_codes(key).is_empty(), "{} has no virtual-key code", key);
        }
    }

    #[test]
    fn test_classify_down_and_up() {
        let watched = KeyName::LeftShift;
        assert_eq!(classify_key_event(watched, 0xA0, WM_KEYDOWN, false), Some(true));
        assert_eq!(classify_key_event(watched, 0xA0, WM_KEYUP, false), Some(false));
        assert_eq!(classify_key_event(watched, 0xA0, WM_SYSKEYDOWN, false), Some(true));
        assert_eq!(classify_key_event(watched, 0xA0, WM_SYSKEYUP, false), Some(false));
    }

    #[test]
    fn test_classify_ignores_other_keys_and_injected() {
        let watched = KeyName::LeftShift;
        assert_eq!(classify_key_event(watched, 0xA1, WM_KEYDOWN, false), None);
        assert_eq!(classify_key_event(watched, 0xA0, WM_KEYDOWN, true), None);
        assert_eq!(classify_key_event(watched, 0x1_00A0, WM_KEYDOWN, false), None);
        assert_eq!(classify_key_event(watched, 0xA0, 0x0102, false), None);
    }

    #[test]
    fn test_classify_generic_watched_key() {
        assert_eq!(classify_key_event(KeyName::Shift, 0xA1, WM_KEYDOWN, false), Some(true));
        assert_eq!(classify_key_event(KeyName::Shift, 0xA0, WM_KEYUP, false), Some(false));
    }
}
