//! Explorer poll task.
//!
//! Runs [`ExplorerPollLoop`] on a fixed cadence. Each cycle executes on the
//! blocking pool because COM calls and the pauses between nudges block;
//! the loop state is moved onto that thread and back.
//!
//! Config changes that land while a cycle is running collapse to the latest
//! value, so a disable followed by a re-enable would go unseen. The app bumps
//! a shared disable counter on every enabled to disabled transition; the
//! poller compares it before each cycle and drops its tracker when it moved.

use crate::config::Config;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info};
use wintoolbox_core::{BrowserAutomation, ExplorerPollLoop, ForegroundQuery, KeystrokeInjector};

/// Handle to the running poll task.
pub struct Poller {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Start polling.
    ///
    /// `enter` runs on the blocking thread before every cycle; the guard it
    /// returns is dropped after the cycle (used for the COM apartment).
    /// `disables` counts enabled to disabled transitions of the Explorer
    /// feature and must be bumped before the disabling config is published.
    pub fn spawn<B, K, F, G>(
        poll: ExplorerPollLoop<B, K>,
        foreground: F,
        enter: fn() -> G,
        config_rx: watch::Receiver<Arc<Config>>,
        disables: Arc<AtomicU64>,
        tracked_folders: Arc<AtomicUsize>,
    ) -> Self
    where
        B: BrowserAutomation + Send + 'static,
        K: KeystrokeInjector + Send + 'static,
        F: ForegroundQuery + Send + 'static,
        G: 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(
            poll,
            foreground,
            enter,
            config_rx,
            disables,
            tracked_folders,
            shutdown_rx,
        ));
        Self {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Stop after the current cycle, waiting at most `timeout`.
    pub async fn stop(mut self, timeout: Duration) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => info!("Explorer poller stopped"),
            Ok(Err(e)) => error!("Explorer poller failed: {}", e),
            Err(_) => {
                error!("Explorer poller did not stop within {:?}", timeout);
                self.task.abort();
            }
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Clear the tracker if a disable happened since `seen` was last updated.
fn catch_up_disables<B, K>(
    poll: &mut ExplorerPollLoop<B, K>,
    disables: &AtomicU64,
    seen: &mut u64,
    tracked_folders: &AtomicUsize,
) where
    B: BrowserAutomation,
    K: KeystrokeInjector,
{
    let current = disables.load(Ordering::Acquire);
    if current == *seen {
        return;
    }
    debug!("Explorer was disabled {} time(s) since last check", current - *seen);
    *seen = current;
    poll.set_enabled(false);
    tracked_folders.store(0, Ordering::Relaxed);
}

async fn run<B, K, F, G>(
    mut poll: ExplorerPollLoop<B, K>,
    mut foreground: F,
    enter: fn() -> G,
    mut config_rx: watch::Receiver<Arc<Config>>,
    disables: Arc<AtomicU64>,
    tracked_folders: Arc<AtomicUsize>,
    mut shutdown: oneshot::Receiver<()>,
) where
    B: BrowserAutomation + Send + 'static,
    K: KeystrokeInjector + Send + 'static,
    F: ForegroundQuery + Send + 'static,
    G: 'static,
{
    let mut period = config_rx.borrow().poll_interval();
    let mut ticks = ticker(period);
    let mut seen_disables = disables.load(Ordering::Acquire);
    info!("Explorer poller started ({:?} interval)", period);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let config = config_rx.borrow_and_update().clone();
                catch_up_disables(&mut poll, &disables, &mut seen_disables, &tracked_folders);
                poll.set_enabled(config.explorer.enabled);
                tracked_folders.store(poll.tracker().len(), Ordering::Relaxed);

                let new_period = config.poll_interval();
                if new_period != period {
                    period = new_period;
                    ticks = ticker(period);
                    info!("Explorer poll interval changed to {:?}", period);
                }
            }
            _ = ticks.tick() => {
                catch_up_disables(&mut poll, &disables, &mut seen_disables, &tracked_folders);
                let params = config_rx.borrow().explorer_params();
                if !params.enabled {
                    poll.set_enabled(false);
                    tracked_folders.store(0, Ordering::Relaxed);
                    continue;
                }

                let cycle = tokio::task::spawn_blocking(move || {
                    let _guard = enter();
                    let report = poll.run_cycle(&params, &foreground);
                    (poll, foreground, report)
                })
                .await;

                match cycle {
                    Ok((p, f, report)) => {
                        poll = p;
                        foreground = f;
                        debug!("Explorer poll cycle: {:?}", report);
                        tracked_folders.store(poll.tracker().len(), Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!("Explorer poll cycle panicked, poller stopping: {}", e);
                        return;
                    }
                }
            }
        }
    }

    debug!("Explorer poller exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Instant;
    use wintoolbox_core::{BrowserWindow, GroupBy, PlatformError, ViewMode, WindowHandle};

    const WINDOW: WindowHandle = WindowHandle(0x77);

    /// Folder state shared between a test and the fake shell.
    #[derive(Clone, Default)]
    struct SharedFolder {
        path: Arc<Mutex<String>>,
        reads: Arc<AtomicUsize>,
        slow: Arc<AtomicBool>,
    }

    impl SharedFolder {
        fn at(path: &str) -> Self {
            let folder = Self::default();
            folder.set_path(path);
            folder
        }

        fn set_path(&self, path: &str) {
            *self.path.lock().unwrap() = path.to_string();
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    struct SharedWindow {
        folder: SharedFolder,
    }

    impl BrowserWindow for SharedWindow {
        fn handle(&self) -> WindowHandle {
            WINDOW
        }

        fn folder_path(&self) -> Result<String, PlatformError> {
            let path = self.folder.path.lock().unwrap().clone();
            self.folder.reads.fetch_add(1, Ordering::SeqCst);
            if self.folder.slow.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(path)
        }

        fn view_mode(&self) -> Result<ViewMode, PlatformError> {
            Ok(ViewMode::DETAILS)
        }

        fn set_view_mode(&self, _mode: ViewMode) -> Result<(), PlatformError> {
            Ok(())
        }

        fn set_group_by(&self, _group: &GroupBy) -> Result<(), PlatformError> {
            Ok(())
        }

        fn set_sort(&self, _column: &str, _ascending: bool) -> Result<(), PlatformError> {
            Ok(())
        }

        fn refresh(&self) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    struct SharedShell {
        folder: SharedFolder,
    }

    impl BrowserAutomation for SharedShell {
        type Window = SharedWindow;

        fn browser_windows(&self) -> Result<Vec<SharedWindow>, PlatformError> {
            Ok(vec![SharedWindow {
                folder: self.folder.clone(),
            }])
        }
    }

    struct CountingKeys(Arc<AtomicUsize>);

    impl KeystrokeInjector for CountingKeys {
        fn send_zoom_nudge(&self) -> Result<(), PlatformError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct AlwaysForeground;

    impl ForegroundQuery for AlwaysForeground {
        fn foreground_window(&self) -> Option<WindowHandle> {
            Some(WINDOW)
        }
    }

    fn fast_config(enabled: bool) -> Arc<Config> {
        let mut config = Config::default();
        config.explorer.enabled = enabled;
        config.explorer.repeated_nudge = false;
        config.explorer.poll_interval_ms = 20;
        Arc::new(config)
    }

    async fn wait_for(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_poller_tracks_folders_and_clears_on_disable() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();

        rt.block_on(async {
            let folder = SharedFolder::at(r"C:\Users");
            let nudges = Arc::new(AtomicUsize::new(0));
            let tracked = Arc::new(AtomicUsize::new(0));
            let disables = Arc::new(AtomicU64::new(0));
            let (config_tx, config_rx) = watch::channel(fast_config(true));

            let poll = ExplorerPollLoop::new(
                SharedShell {
                    folder: folder.clone(),
                },
                CountingKeys(nudges.clone()),
            );
            let poller = Poller::spawn(
                poll,
                AlwaysForeground,
                || (),
                config_rx,
                disables.clone(),
                tracked.clone(),
            );

            wait_for("first observation", || tracked.load(Ordering::Relaxed) == 1).await;
            assert_eq!(nudges.load(Ordering::SeqCst), 0);

            folder.set_path(r"C:\Windows");
            wait_for("one-shot nudge", || nudges.load(Ordering::SeqCst) == 1).await;

            disables.fetch_add(1, Ordering::Release);
            config_tx.send_replace(fast_config(false));
            wait_for("tracker cleared", || tracked.load(Ordering::Relaxed) == 0).await;

            poller.stop(Duration::from_secs(5)).await;
        });
    }

    #[test]
    fn test_disable_and_reenable_during_cycle_clears_tracker() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();

        rt.block_on(async {
            let folder = SharedFolder::at(r"C:\Users");
            let nudges = Arc::new(AtomicUsize::new(0));
            let tracked = Arc::new(AtomicUsize::new(0));
            let disables = Arc::new(AtomicU64::new(0));
            let (config_tx, config_rx) = watch::channel(fast_config(true));

            let poll = ExplorerPollLoop::new(
                SharedShell {
                    folder: folder.clone(),
                },
                CountingKeys(nudges.clone()),
            );
            let poller = Poller::spawn(
                poll,
                AlwaysForeground,
                || (),
                config_rx,
                disables.clone(),
                tracked.clone(),
            );

            wait_for("first observation", || tracked.load(Ordering::Relaxed) == 1).await;

            // Hold the next cycle on the blocking pool after it read the path
            folder.slow.store(true, Ordering::SeqCst);
            let before = folder.reads();
            wait_for("slow cycle", || folder.reads() > before).await;
            let in_flight = folder.reads();

            disables.fetch_add(1, Ordering::Release);
            config_tx.send_replace(fast_config(false));
            tokio::time::sleep(Duration::from_millis(20)).await;
            config_tx.send_replace(fast_config(true));

            folder.set_path(r"C:\Windows");
            folder.slow.store(false, Ordering::SeqCst);

            // Two full cycles after the slow one
            wait_for("later cycles", || folder.reads() >= in_flight + 2).await;
            assert_eq!(nudges.load(Ordering::SeqCst), 0);
            wait_for("new folder tracked", || tracked.load(Ordering::Relaxed) == 1).await;

            poller.stop(Duration::from_secs(5)).await;
        });
    }

    #[test]
    fn test_poller_stops_when_config_sender_dropped() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        rt.block_on(async {
            let (config_tx, config_rx) = watch::channel(fast_config(false));
            let poll = ExplorerPollLoop::new(
                SharedShell {
                    folder: SharedFolder::default(),
                },
                CountingKeys(Arc::new(AtomicUsize::new(0))),
            );
            let poller = Poller::spawn(
                poll,
                AlwaysForeground,
                || (),
                config_rx,
                Arc::new(AtomicU64::new(0)),
                Arc::new(AtomicUsize::new(0)),
            );

            drop(config_tx);
            let finished = tokio::time::timeout(Duration::from_secs(5), poller.task).await;
            assert!(matches!(finished, Ok(Ok(()))));
        });
    }
}
