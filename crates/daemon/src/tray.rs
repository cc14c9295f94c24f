//! System tray icon for the WinToolbox daemon.
//!
//! Provides a context menu for:
//! - Toggling snap & restore
//! - Toggling the Explorer view manager
//! - Reloading and opening the configuration
//! - Exiting the daemon

use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    TrayIcon, TrayIconBuilder,
};
use wintoolbox_platform_win32::{MessageThread, Win32Error};

/// Menu item IDs for tray context menu.
mod menu_ids {
    pub const TOGGLE_SNAP: &str = "toggle_snap";
    pub const TOGGLE_EXPLORER: &str = "toggle_explorer";
    pub const RELOAD: &str = "reload";
    pub const OPEN_CONFIG: &str = "open_config";
    pub const EXIT: &str = "exit";
}

/// Events emitted by the tray icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayEvent {
    ToggleSnap,
    ToggleExplorer,
    Reload,
    OpenConfig,
    Exit,
}

impl TrayEvent {
    fn from_menu_id(id: &str) -> Option<Self> {
        match id {
            menu_ids::TOGGLE_SNAP => Some(Self::ToggleSnap),
            menu_ids::TOGGLE_EXPLORER => Some(Self::ToggleExplorer),
            menu_ids::RELOAD => Some(Self::Reload),
            menu_ids::OPEN_CONFIG => Some(Self::OpenConfig),
            menu_ids::EXIT => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Owns the tray thread. Dropping it removes the icon.
pub struct TrayManager {
    _thread: MessageThread,
}

impl TrayManager {
    /// Create the tray icon on its own message-loop thread.
    ///
    /// Menu clicks are delivered to `event_sender`.
    pub fn new(event_sender: mpsc::Sender<TrayEvent>) -> Result<Self, TrayError> {
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            match TrayEvent::from_menu_id(event.id.0.as_str()) {
                Some(tray_event) => {
                    // Receiver dropped means the daemon is exiting
                    let _ = event_sender.send(tray_event);
                }
                None => debug!("Unknown menu item clicked: {}", event.id.0),
            }
        }));

        let thread = MessageThread::spawn("tray", || {
            build_tray().map_err(|e| Win32Error::InitFailed {
                name: "tray".to_string(),
                message: e.to_string(),
            })
        })
        .map_err(|e| {
            MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
            TrayError::Thread(e.to_string())
        })?;

        info!("System tray icon created");
        Ok(Self { _thread: thread })
    }
}

impl Drop for TrayManager {
    fn drop(&mut self) {
        // Releases the event sender so the forwarding thread can exit
        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
    }
}

fn build_tray() -> Result<TrayIcon, TrayError> {
    let menu = Menu::new();
    let items = [
        MenuItem::new("WinToolbox", false, None),
        MenuItem::with_id(menu_ids::TOGGLE_SNAP, "Toggle Snap && Restore", true, None),
        MenuItem::with_id(menu_ids::TOGGLE_EXPLORER, "Toggle Explorer View Manager", true, None),
        MenuItem::with_id(menu_ids::RELOAD, "Reload Config", true, None),
        MenuItem::with_id(menu_ids::OPEN_CONFIG, "Open Config", true, None),
    ];

    menu.append(&items[0]).map_err(|e| TrayError::Menu(e.to_string()))?;
    menu.append(&PredefinedMenuItem::separator())
        .map_err(|e| TrayError::Menu(e.to_string()))?;
    for item in &items[1..] {
        menu.append(item).map_err(|e| TrayError::Menu(e.to_string()))?;
    }
    menu.append(&PredefinedMenuItem::separator())
        .map_err(|e| TrayError::Menu(e.to_string()))?;
    let exit = MenuItem::with_id(menu_ids::EXIT, "Exit", true, None);
    menu.append(&exit).map_err(|e| TrayError::Menu(e.to_string()))?;

    TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip("WinToolbox")
        .with_icon(create_default_icon()?)
        .build()
        .map_err(|e| TrayError::Build(e.to_string()))
}

/// Draw the tray icon: a window outline with a centered inner window.
fn create_default_icon() -> Result<tray_icon::Icon, TrayError> {
    const SIZE: usize = 32;
    const FRAME: [u8; 4] = [230, 230, 230, 255];
    const TITLE: [u8; 4] = [0, 120, 215, 255];
    const INNER: [u8; 4] = [255, 185, 0, 255];

    let mut rgba = vec![0u8; SIZE * SIZE * 4];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let outer_edge = x == 2 || x == SIZE - 3 || y == 2 || y == SIZE - 3;
            let inside_outer = (2..SIZE - 2).contains(&x) && (2..SIZE - 2).contains(&y);
            let title_bar = inside_outer && (3..8).contains(&y);
            let inner = (9..SIZE - 9).contains(&x) && (12..SIZE - 6).contains(&y);

            let color = if title_bar {
                TITLE
            } else if inside_outer && outer_edge {
                FRAME
            } else if inner {
                INNER
            } else {
                continue;
            };
            let idx = (y * SIZE + x) * 4;
            rgba[idx..idx + 4].copy_from_slice(&color);
        }
    }

    tray_icon::Icon::from_rgba(rgba, SIZE as u32, SIZE as u32)
        .map_err(|e| TrayError::Icon(e.to_string()))
}

/// Errors that can occur during tray operations.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create menu: {0}")]
    Menu(String),

    #[error("Failed to build tray icon: {0}")]
    Build(String),

    #[error("Failed to create icon: {0}")]
    Icon(String),

    #[error("Failed to start tray thread: {0}")]
    Thread(String),
}
