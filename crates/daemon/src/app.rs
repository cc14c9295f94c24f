//! Daemon state owned by the main event loop.

use crate::config::{default_config_path, Config, ConfigWarning};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};
use wintoolbox_core::{
    KeyTransition, ModifierQuery, PressSequenceDetector, SnapOutcome, SnapRestoreController,
    WindowOps,
};
use wintoolbox_ipc::{IpcCommand, IpcResponse};

/// Key-event context plus the published configuration.
pub struct AppState {
    detector: PressSequenceDetector,
    controller: SnapRestoreController,
    config_tx: watch::Sender<Arc<Config>>,
    /// File the configuration was loaded from, if any.
    config_path: Option<PathBuf>,
    /// Written by the poll task.
    tracked_folders: Arc<AtomicUsize>,
    /// Bumped on every enabled to disabled transition of the Explorer feature.
    explorer_disables: Arc<AtomicU64>,
    /// Daemon start time for uptime reporting.
    start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let (config_tx, _) = watch::channel(Arc::new(config));
        Self {
            detector: PressSequenceDetector::new(),
            controller: SnapRestoreController::new(),
            config_tx,
            config_path,
            tracked_folders: Arc::new(AtomicUsize::new(0)),
            explorer_disables: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config_tx.borrow().clone()
    }

    /// Receiver for configuration snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.config_tx.subscribe()
    }

    /// Counter of folders known to the poll task.
    pub fn tracked_folders(&self) -> Arc<AtomicUsize> {
        self.tracked_folders.clone()
    }

    /// Disable counter read by the poll task.
    pub fn explorer_disables(&self) -> Arc<AtomicU64> {
        self.explorer_disables.clone()
    }

    /// Path used when opening or saving the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(default_config_path)
    }

    /// Feed a watched-key transition; snap or restore on a completed sequence.
    pub fn handle_key(
        &mut self,
        transition: KeyTransition,
        ops: &impl WindowOps,
        modifiers: &impl ModifierQuery,
    ) -> Option<SnapOutcome> {
        let params = self.config().snap_params();
        let signal = self.detector.on_transition(transition, &params, modifiers)?;
        Some(self.controller.handle(signal, &params, ops))
    }

    /// Execute an IPC command. `Stop` is acknowledged here; the caller
    /// performs the shutdown.
    pub fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        match cmd {
            IpcCommand::QueryStatus => {
                let config = self.config();
                IpcResponse::Status {
                    snap_enabled: config.snap.enabled,
                    explorer_enabled: config.explorer.enabled,
                    hotkey: config.snap.hotkey.clone(),
                    presses: config.snap.presses,
                    interval_ms: config.snap.interval_ms,
                    remembered_windows: self.controller.store().len(),
                    tracked_folders: self.tracked_folders.load(Ordering::Relaxed),
                    uptime_secs: self.start_time.elapsed().as_secs(),
                }
            }
            IpcCommand::SetSnapEnabled { enabled } => {
                self.update(|config| config.snap.enabled = enabled);
                IpcResponse::Ok
            }
            IpcCommand::SetExplorerEnabled { enabled } => {
                self.update(|config| config.explorer.enabled = enabled);
                IpcResponse::Ok
            }
            IpcCommand::Reload => match Config::load() {
                Ok(loaded) => {
                    for w in &loaded.warnings {
                        warn!("Config: {} - {}", w.field, w.message);
                    }
                    if loaded.path.is_some() {
                        self.config_path = loaded.path;
                    }
                    self.apply_config(loaded.config);
                    info!("Configuration reloaded");
                    IpcResponse::Ok
                }
                Err(e) => IpcResponse::error(format!("Failed to reload config: {:#}", e)),
            },
            IpcCommand::Stop => IpcResponse::Ok,
        }
    }

    /// Toggle snap & restore and persist the change.
    pub fn toggle_snap(&mut self) -> bool {
        let enabled = !self.config().snap.enabled;
        self.update(|config| config.snap.enabled = enabled);
        enabled
    }

    /// Toggle the Explorer view manager and persist the change.
    pub fn toggle_explorer(&mut self) -> bool {
        let enabled = !self.config().explorer.enabled;
        self.update(|config| config.explorer.enabled = enabled);
        enabled
    }

    /// Validate and publish a new snapshot.
    pub fn apply_config(&mut self, mut config: Config) -> Vec<ConfigWarning> {
        let warnings = config.validate();
        for w in &warnings {
            warn!("Config: {} - {}", w.field, w.message);
        }

        let current = self.config();
        // Presses counted under the old key or timing are meaningless now
        if config.snap != current.snap {
            self.detector.reset();
        }
        // Must be visible before the snapshot that disables
        if current.explorer.enabled && !config.explorer.enabled {
            self.explorer_disables.fetch_add(1, Ordering::Release);
        }
        self.config_tx.send_replace(Arc::new(config));
        warnings
    }

    /// Write the current configuration to disk, creating the file if needed.
    pub fn save(&mut self) -> Result<PathBuf> {
        let path = self.config_path();
        self.config().save_to_path(&path)?;
        self.config_path = Some(path.clone());
        Ok(path)
    }

    fn update(&mut self, change: impl FnOnce(&mut Config)) {
        let mut config = Config::clone(&self.config());
        change(&mut config);
        self.apply_config(config);
        match self.save() {
            Ok(path) => info!("Saved configuration to {}", path.display()),
            Err(e) => warn!("Failed to save configuration: {:#}", e),
        }
    }
}
