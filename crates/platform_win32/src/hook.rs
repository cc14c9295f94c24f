//! Low-level keyboard hook for the watched key.
//!
//! The hook callback runs on the `key-hook` thread. It only filters and
//! forwards transitions; all sequence logic happens elsewhere.

use crate::keys::classify_key_event;
use crate::message_thread::MessageThread;
use crate::Win32Error;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    LLKHF_INJECTED, WH_KEYBOARD_LL,
};
use wintoolbox_core::{KeyName, KeyTransition};

/// Where the hook callback delivers transitions.
struct HookSink {
    watched: KeyName,
    sender: mpsc::Sender<KeyTransition>,
}

static HOOK_SINK: Mutex<Option<HookSink>> = Mutex::new(None);

/// Owns the installed hook. Dropping it uninstalls the hook.
pub struct KeyHookHandle {
    _thread: MessageThread,
}

impl Drop for KeyHookHandle {
    fn drop(&mut self) {
        if let Ok(mut sink) = HOOK_SINK.lock() {
            *sink = None;
        }
        info!("Keyboard hook uninstalled");
    }
}

/// Unhooks on the thread that installed the hook.
struct HookGuard(HHOOK);

impl Drop for HookGuard {
    fn drop(&mut self) {
        if let Err(e) = unsafe { UnhookWindowsHookEx(self.0) } {
            warn!("UnhookWindowsHookEx failed: {}", e);
        }
    }
}

/// Install the global keyboard hook, watching `watched`.
///
/// Only one hook can be installed per process.
pub fn install_key_hook(
    watched: KeyName,
) -> Result<(KeyHookHandle, mpsc::Receiver<KeyTransition>), Win32Error> {
    let (sender, receiver) = mpsc::channel();
    {
        let mut sink = HOOK_SINK
            .lock()
            .map_err(|e| Win32Error::HookInstallFailed(e.to_string()))?;
        if sink.is_some() {
            return Err(Win32Error::HookAlreadyInstalled);
        }
        *sink = Some(HookSink { watched, sender });
    }

    let thread = MessageThread::spawn("key-hook", || {
        unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) }
            .map(HookGuard)
            .map_err(|e| Win32Error::HookInstallFailed(e.to_string()))
    });

    match thread {
        Ok(thread) => {
            info!("Keyboard hook installed, watching {}", watched);
            Ok((KeyHookHandle { _thread: thread }, receiver))
        }
        Err(e) => {
            if let Ok(mut sink) = HOOK_SINK.lock() {
                *sink = None;
            }
            Err(e)
        }
    }
}

/// Change the key the installed hook reports.
pub fn set_watched_key(key: KeyName) {
    if let Ok(mut sink) = HOOK_SINK.lock() {
        if let Some(sink) = sink.as_mut() {
            if sink.watched != key {
                info!("Watched key changed from {} to {}", sink.watched, key);
                sink.watched = key;
            }
        }
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let event = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let injected = event.flags.0 & LLKHF_INJECTED.0 != 0;
        forward(event.vkCode, wparam.0 as u32, injected);
    }
    CallNextHookEx(None, code, wparam, lparam)
}

fn forward(vk_code: u32, message: u32, injected: bool) {
    let at = Instant::now();
    let Ok(sink) = HOOK_SINK.lock() else {
        return;
    };
    let Some(sink) = sink.as_ref() else {
        return;
    };
    if let Some(is_down) = classify_key_event(sink.watched, vk_code, message, injected) {
        // Receiver gone means shutdown is in progress
        let _ = sink.sender.send(KeyTransition {
            key: sink.watched,
            is_down,
            at,
        });
    }
}
