//! Keyboard state queries and synthetic keystrokes.

use crate::keys::vk_codes;
use std::mem;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_ADD, VK_CONTROL,
};
use wintoolbox_core::{KeyName, KeystrokeInjector, ModifierQuery, PlatformError};

/// Reads the physical key state at the moment of the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncKeyState;

impl ModifierQuery for AsyncKeyState {
    fn is_held(&self, key: KeyName) -> bool {
        vk_codes(key)
            .iter()
            .any(|&vk| unsafe { GetAsyncKeyState(i32::from(vk)) } < 0)
    }
}

/// Injects keystrokes into the foreground window with `SendInput`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendInputInjector;

impl KeystrokeInjector for SendInputInjector {
    fn send_zoom_nudge(&self) -> Result<(), PlatformError> {
        let inputs = [
            key_input(VK_CONTROL, false),
            key_input(VK_ADD, false),
            key_input(VK_ADD, true),
            key_input(VK_CONTROL, true),
        ];
        let sent = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(PlatformError::call(
                "SendInput",
                format!("{} of {} events injected", sent, inputs.len()),
            ));
        }
        Ok(())
    }
}

fn key_input(vk: VIRTUAL_KEY, up: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}
