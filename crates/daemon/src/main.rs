//! WinToolbox Daemon
//!
//! Background process for the WinToolbox window utilities.
//!
//! Responsibilities:
//! - Detect the snap key sequence and snap or restore the foreground window
//! - Run the Explorer view manager poll task
//! - Handle IPC commands from the CLI
//! - System tray icon and menu

#![cfg_attr(not(windows), allow(dead_code))]

mod app;
mod config;
mod poller;
#[cfg(windows)]
mod tray;

use anyhow::Result;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use wintoolbox_core::KeyTransition;
use wintoolbox_ipc::{IpcCommand, IpcResponse};

#[cfg(windows)]
use {
    app::AppState,
    config::Config,
    std::path::Path,
    tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    tokio::net::windows::named_pipe::{PipeMode, ServerOptions},
    tracing::{debug, error, info, warn},
    tracing_subscriber::{EnvFilter, FmtSubscriber},
    wintoolbox_core::{ExplorerPollLoop, SnapOutcome},
    wintoolbox_ipc::{decode_line, MAX_IPC_MESSAGE_SIZE, PIPE_NAME},
    wintoolbox_platform_win32::{
        install_key_hook, set_watched_key, AsyncKeyState, ComApartment, SendInputInjector,
        ShellAutomation, Win32WindowOps,
    },
};

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// A transition of the watched key.
    Key(KeyTransition),
    /// A tray menu event.
    #[cfg(windows)]
    Tray(tray::TrayEvent),
    /// Shutdown signal.
    Shutdown,
}

/// Maximum time to wait for a client to send its command line.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum time to wait for the in-flight Explorer cycle at shutdown.
const POLLER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the IPC server, accepting connections and dispatching commands.
#[cfg(windows)]
async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
    let mut is_first_instance = true;

    loop {
        let server = match ServerOptions::new()
            .first_pipe_instance(is_first_instance)
            .pipe_mode(PipeMode::Byte)
            .create(PIPE_NAME)
        {
            Ok(s) => {
                is_first_instance = false;
                s
            }
            Err(e) => {
                error!("Failed to create named pipe server: {}", e);
                if is_first_instance {
                    error!("Is another wintoolbox daemon already running?");
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        debug!("Waiting for client connection on {}", PIPE_NAME);

        if let Err(e) = server.connect().await {
            error!("Failed to accept client connection: {}", e);
            continue;
        }

        debug!("Client connected");

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(server, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

/// Serialize a response line, falling back to a fixed error line.
fn response_line(response: &IpcResponse) -> String {
    match wintoolbox_ipc::encode_line(response) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("Failed to serialize IPC response: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    }
}

/// Handle a single client connection.
#[cfg(windows)]
async fn handle_client(
    pipe: tokio::net::windows::named_pipe::NamedPipeServer,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> Result<()> {
    let (reader, mut writer) = tokio::io::split(pipe);
    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();

    let bytes_read =
        match tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            // Client did not send in time
            Err(_) => return Ok(()),
        };
    if bytes_read == 0 {
        return Ok(());
    }

    debug!("Received command: {}", line.trim());

    let cmd: IpcCommand = match decode_line(&line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            writer.write_all(response_line(&response).as_bytes()).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);
    let (resp_tx, resp_rx) = oneshot::channel();

    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = IpcResponse::error("Daemon is shutting down");
        writer.write_all(response_line(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = resp_rx
        .await
        .unwrap_or_else(|_| IpcResponse::error("Failed to get response from daemon"));
    writer.write_all(response_line(&response).as_bytes()).await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Spawn a named forwarding thread that receives events from a std::sync::mpsc channel
/// and forwards them to a tokio mpsc sender. Returns the JoinHandle for graceful shutdown.
fn spawn_forwarding_thread<T: Send + 'static>(
    name: &str,
    receiver: std::sync::mpsc::Receiver<T>,
    sender: mpsc::Sender<DaemonEvent>,
    map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(map_fn(event)).is_err() {
                    break; // Channel closed, daemon shutting down
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

/// Check if another daemon instance is already running by probing the named pipe.
#[cfg(windows)]
async fn check_already_running() -> bool {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(PIPE_NAME)
        .is_ok()
}

/// Open the configuration file in the default editor, writing it first if absent.
#[cfg(windows)]
fn open_config(state: &mut AppState) {
    let path = state.config_path();
    if !path.exists() {
        if let Err(e) = state.save() {
            warn!("Failed to write config file {}: {:#}", path.display(), e);
            return;
        }
    }
    open_in_shell(&path);
}

#[cfg(windows)]
fn open_in_shell(path: &Path) {
    match std::process::Command::new("cmd")
        .args(["/c", "start", "", &path.to_string_lossy()])
        .spawn()
    {
        Ok(_) => info!("Opened {}", path.display()),
        Err(e) => warn!("Failed to open {}: {}", path.display(), e),
    }
}

#[cfg(windows)]
fn log_outcome(outcome: SnapOutcome) {
    match outcome {
        SnapOutcome::Snapped(rect) => info!("Snapped foreground window to {:?}", rect),
        SnapOutcome::Restored(rect) => info!("Restored foreground window to {:?}", rect),
        SnapOutcome::Skipped(reason) => debug!("Snap skipped: {:?}", reason),
    }
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    anyhow::bail!("wintoolbox only runs on Windows")
}

#[cfg(windows)]
#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level)
    let loaded = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        config::LoadedConfig {
            config: Config::default(),
            path: None,
            warnings: Vec::new(),
        }
    });
    let mut config = loaded.config;
    let config_warnings = config.validate();

    // RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.behavior.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    for w in loaded.warnings.iter().chain(&config_warnings) {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("WinToolbox daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if check_already_running().await {
        error!("Another wintoolbox daemon is already running (pipe {} is active)", PIPE_NAME);
        return Ok(());
    }

    match &loaded.path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }
    info!(
        "Snap: enabled={}, key={}, presses={}, interval={}ms; Explorer: enabled={}, poll={}ms",
        config.snap.enabled,
        config.snap.hotkey,
        config.snap.presses,
        config.snap.interval_ms,
        config.explorer.enabled,
        config.explorer.poll_interval_ms
    );

    let hotkey = config.snap_params().hotkey;
    let mut state = AppState::new(config, loaded.path);

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    // Collect forwarding thread handles for graceful shutdown
    let mut thread_handles: Vec<std::thread::JoinHandle<()>> = Vec::new();

    let hook_handle = match install_key_hook(hotkey) {
        Ok((handle, key_rx)) => {
            match spawn_forwarding_thread("key-fwd", key_rx, event_tx.clone(), DaemonEvent::Key) {
                Ok(handle) => thread_handles.push(handle),
                Err(e) => warn!("{}", e),
            }
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to install keyboard hook: {}. Snap & restore disabled.", e);
            None
        }
    };

    let poller = poller::Poller::spawn(
        ExplorerPollLoop::new(ShellAutomation, SendInputInjector),
        Win32WindowOps,
        ComApartment::enter,
        state.subscribe(),
        state.explorer_disables(),
        state.tracked_folders(),
    );

    let tray_manager = {
        let (tray_sync_tx, tray_sync_rx) = std::sync::mpsc::channel();

        match spawn_forwarding_thread("tray-fwd", tray_sync_rx, event_tx.clone(), DaemonEvent::Tray)
        {
            Ok(handle) => thread_handles.push(handle),
            Err(e) => warn!("{}", e),
        }

        match tray::TrayManager::new(tray_sync_tx) {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!("Failed to create system tray icon: {}. Tray disabled.", e);
                None
            }
        }
    };

    let ipc_tx = event_tx.clone();
    tokio::spawn(async move {
        run_ipc_server(ipc_tx).await;
    });

    info!("IPC server listening on {}", PIPE_NAME);

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    info!("Ready. Use wintoolbox-cli to send commands.");

    while let Some(event) = event_rx.recv().await {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let response = state.handle_command(cmd);
                set_watched_key(state.config().snap_params().hotkey);

                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
            }
            DaemonEvent::Key(transition) => {
                if let Some(outcome) =
                    state.handle_key(transition, &Win32WindowOps, &AsyncKeyState)
                {
                    log_outcome(outcome);
                }
            }
            DaemonEvent::Tray(tray_event) => match tray_event {
                tray::TrayEvent::ToggleSnap => {
                    let enabled = state.toggle_snap();
                    info!("Tray: snap & restore {}", if enabled { "enabled" } else { "disabled" });
                }
                tray::TrayEvent::ToggleExplorer => {
                    let enabled = state.toggle_explorer();
                    info!(
                        "Tray: Explorer view manager {}",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                tray::TrayEvent::Reload => {
                    info!("Tray: reload config requested");
                    if let IpcResponse::Error { message } = state.handle_command(IpcCommand::Reload)
                    {
                        warn!("{}", message);
                    }
                    set_watched_key(state.config().snap_params().hotkey);
                }
                tray::TrayEvent::OpenConfig => {
                    info!("Tray: open config requested");
                    open_config(&mut state);
                }
                tray::TrayEvent::Exit => {
                    info!("Tray: exit requested");
                    break;
                }
            },
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    poller.stop(POLLER_STOP_TIMEOUT).await;

    // Unhooks and closes the key channel, ending key-fwd
    drop(hook_handle);
    // Hides the icon and releases the menu handler, ending tray-fwd
    drop(tray_manager);

    info!("Waiting for forwarding threads to exit...");
    // The loop is gone, so blocked senders fail instead of waiting for capacity
    drop(event_rx);
    for handle in thread_handles {
        let _ = handle.join();
    }

    info!("WinToolbox daemon shutting down.");
    Ok(())
}
