//! WinToolbox Platform Win32
//!
//! Windows implementations of the capabilities the core consumes.
//!
//! This crate handles:
//! - A low-level keyboard hook on its own message-loop thread
//! - Modifier state queries and synthetic keystroke injection
//! - Foreground window geometry, maximize state, identity and monitor bounds
//! - Explorer (Shell window) automation via COM
//!
//! Only the virtual-key mapping is platform independent; everything that
//! touches the OS is compiled on Windows only.

pub mod keys;

#[cfg(windows)]
pub mod explorer;
#[cfg(windows)]
pub mod hook;
#[cfg(windows)]
pub mod input;
#[cfg(windows)]
pub mod message_thread;
#[cfg(windows)]
pub mod window;

#[cfg(windows)]
pub use explorer::{ComApartment, ShellAutomation, ShellWindow};
#[cfg(windows)]
pub use hook::{install_key_hook, set_watched_key, KeyHookHandle};
#[cfg(windows)]
pub use input::{AsyncKeyState, SendInputInjector};
#[cfg(windows)]
pub use message_thread::MessageThread;
#[cfg(windows)]
pub use window::Win32WindowOps;

pub use keys::{classify_key_event, vk_codes};

use thiserror::Error;

/// Errors that can occur while setting up Win32 integration.
#[derive(Debug, Error)]
pub enum Win32Error {
    #[error("Failed to spawn {name} thread: {message}")]
    ThreadSpawn { name: String, message: String },

    #[error("{0} thread exited before it finished initializing")]
    ThreadInit(String),

    #[error("{name} thread failed to initialize: {message}")]
    InitFailed { name: String, message: String },

    #[error("Failed to install keyboard hook: {0}")]
    HookInstallFailed(String),

    #[error("Keyboard hook is already installed")]
    HookAlreadyInstalled,
}

#[cfg(windows)]
pub(crate) fn hwnd_of(window: wintoolbox_core::WindowHandle) -> windows::Win32::Foundation::HWND {
    windows::Win32::Foundation::HWND(window.0 as usize as *mut std::ffi::c_void)
}

#[cfg(windows)]
pub(crate) fn handle_of(hwnd: windows::Win32::Foundation::HWND) -> wintoolbox_core::WindowHandle {
    wintoolbox_core::WindowHandle(hwnd.0 as usize as u64)
}

#[cfg(windows)]
pub(crate) fn api_error(
    api: &'static str,
    error: windows::core::Error,
) -> wintoolbox_core::PlatformError {
    wintoolbox_core::PlatformError::call(api, error.to_string())
}
