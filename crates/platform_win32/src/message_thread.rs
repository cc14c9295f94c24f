//! Dedicated thread running a Win32 message loop.
//!
//! Low-level hooks and tray icons deliver their callbacks through the
//! message queue of the thread that created them, so each of them gets its
//! own thread. The resource returned by `init` lives on that thread and is
//! dropped there once the loop ends.

use crate::Win32Error;
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, TranslateMessage, MSG,
    PM_NOREMOVE, WM_QUIT,
};

/// A running message-loop thread. Dropping it quits the loop and joins.
pub struct MessageThread {
    name: String,
    thread_id: u32,
    handle: Option<JoinHandle<()>>,
}

impl MessageThread {
    /// Spawn a thread, run `init` on it, then pump messages until dropped.
    ///
    /// Returns once `init` has finished; its error is returned here.
    pub fn spawn<R, F>(name: &str, init: F) -> Result<Self, Win32Error>
    where
        F: FnOnce() -> Result<R, Win32Error> + Send + 'static,
        R: 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, Win32Error>>();
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut msg = MSG::default();
                // Force creation of the message queue before anyone posts to it
                unsafe {
                    let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
                }

                let resource = match init() {
                    Ok(resource) => resource,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                unsafe {
                    while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
                drop(resource);
            })
            .map_err(|e| Win32Error::ThreadSpawn {
                name: thread_name.clone(),
                message: e.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                debug!("{} thread running (id {})", thread_name, thread_id);
                Ok(Self {
                    name: thread_name,
                    thread_id,
                    handle: Some(handle),
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Win32Error::ThreadInit(thread_name))
            }
        }
    }
}

impl Drop for MessageThread {
    fn drop(&mut self) {
        let posted = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            warn!("Failed to stop {} thread: {}", self.name, e);
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} thread panicked", self.name);
            }
        }
        debug!("{} thread stopped", self.name);
    }
}
