//! WinToolbox CLI
//!
//! Command-line interface for controlling the WinToolbox daemon.
//!
//! Commands are sent to the daemon via IPC (named pipe).

#![cfg_attr(not(windows), allow(dead_code))]

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use wintoolbox_ipc::{IpcCommand, IpcResponse};

#[cfg(windows)]
use {
    anyhow::{bail, Context},
    tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient},
    wintoolbox_ipc::{decode_line, encode_line, MAX_IPC_MESSAGE_SIZE, PIPE_NAME},
};

/// How long to keep retrying while every pipe instance is busy.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the daemon's reply.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Win32 `ERROR_PIPE_BUSY`.
#[cfg(windows)]
const ERROR_PIPE_BUSY: i32 = 231;

#[derive(Parser)]
#[command(name = "wintoolbox-cli")]
#[command(author, version, about = "Control the WinToolbox daemon")]
struct Cli {
    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show feature state and counters
    Status,
    /// Turn snap & restore on or off
    Snap {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Turn the Explorer view manager on or off
    Explorer {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Reload configuration
    Reload,
    /// Stop the daemon
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn enabled(self) -> bool {
        self == Switch::On
    }
}

impl Commands {
    fn to_ipc(&self) -> IpcCommand {
        match self {
            Commands::Status => IpcCommand::QueryStatus,
            Commands::Snap { state } => IpcCommand::SetSnapEnabled {
                enabled: state.enabled(),
            },
            Commands::Explorer { state } => IpcCommand::SetExplorerEnabled {
                enabled: state.enabled(),
            },
            Commands::Reload => IpcCommand::Reload,
            Commands::Stop => IpcCommand::Stop,
        }
    }

    /// Message printed for a plain `ok` reply.
    fn success_message(&self) -> &'static str {
        match self {
            Commands::Status => "OK",
            Commands::Snap { state: Switch::On } => "Snap & restore enabled",
            Commands::Snap { state: Switch::Off } => "Snap & restore disabled",
            Commands::Explorer { state: Switch::On } => "Explorer view manager enabled",
            Commands::Explorer { state: Switch::Off } => "Explorer view manager disabled",
            Commands::Reload => "Configuration reloaded",
            Commands::Stop => "Daemon stopping",
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn format_uptime(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render a response for humans.
fn format_response(command: &Commands, response: &IpcResponse) -> String {
    match response {
        IpcResponse::Ok => command.success_message().to_string(),
        IpcResponse::Error { message } => format!("Error: {}", message),
        IpcResponse::Status {
            snap_enabled,
            explorer_enabled,
            hotkey,
            presses,
            interval_ms,
            remembered_windows,
            tracked_folders,
            uptime_secs,
        } => [
            format!(
                "Snap & restore:        {} ({} x{} within {} ms)",
                on_off(*snap_enabled),
                hotkey,
                presses,
                interval_ms
            ),
            format!("Explorer view manager: {}", on_off(*explorer_enabled)),
            format!("Remembered windows:    {}", remembered_windows),
            format!("Tracked folders:       {}", tracked_folders),
            format!("Uptime:                {}", format_uptime(*uptime_secs)),
        ]
        .join("\n"),
    }
}

/// Open the daemon's pipe, retrying while all instances are busy.
#[cfg(windows)]
async fn connect() -> Result<NamedPipeClient> {
    let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
    loop {
        match ClientOptions::new().open(PIPE_NAME) {
            Ok(client) => return Ok(client),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                if tokio::time::Instant::now() >= deadline {
                    bail!("Daemon is busy (pipe {} has no free instance)", PIPE_NAME);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("WinToolbox daemon is not running (no pipe at {})", PIPE_NAME);
            }
            Err(e) => return Err(e).context(format!("Failed to connect to {}", PIPE_NAME)),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Send one command and wait for the reply line.
#[cfg(windows)]
async fn send_command(cmd: &IpcCommand) -> Result<IpcResponse> {
    let pipe = connect().await?;
    let (reader, mut writer) = tokio::io::split(pipe);

    writer
        .write_all(encode_line(cmd)?.as_bytes())
        .await
        .context("Failed to send command")?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    let bytes_read = tokio::time::timeout(RESPONSE_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the daemon to respond")?
        .context("Failed to read response")?;
    if bytes_read == 0 {
        bail!("Daemon closed the connection without responding");
    }

    Ok(decode_line(&line)?)
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    let _ = Cli::parse();
    anyhow::bail!("wintoolbox-cli only runs on Windows")
}

#[cfg(windows)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let response = send_command(&cli.command.to_ipc()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    match &response {
        IpcResponse::Error { message } => bail!("{}", message),
        _ if cli.json => {}
        _ => println!("{}", format_response(&cli.command, &response)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("wintoolbox-cli").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_maps_to_query() {
        let cli = parse(&["status"]);
        assert_eq!(cli.command.to_ipc(), IpcCommand::QueryStatus);
        assert!(!cli.json);
    }

    #[test]
    fn test_toggle_commands() {
        assert_eq!(
            parse(&["snap", "on"]).command.to_ipc(),
            IpcCommand::SetSnapEnabled { enabled: true }
        );
        assert_eq!(
            parse(&["snap", "off"]).command.to_ipc(),
            IpcCommand::SetSnapEnabled { enabled: false }
        );
        assert_eq!(
            parse(&["explorer", "off"]).command.to_ipc(),
            IpcCommand::SetExplorerEnabled { enabled: false }
        );
    }

    #[test]
    fn test_toggle_requires_on_or_off() {
        let result = Cli::try_parse_from(["wintoolbox-cli", "snap", "maybe"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["wintoolbox-cli", "explorer"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_flag_is_global() {
        let cli = parse(&["reload", "--json"]);
        assert!(cli.json);
        assert_eq!(cli.command.to_ipc(), IpcCommand::Reload);

        let cli = parse(&["--json", "stop"]);
        assert!(cli.json);
        assert_eq!(cli.command.to_ipc(), IpcCommand::Stop);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59), "59s");
        assert_eq!(format_uptime(61), "1m 1s");
        assert_eq!(format_uptime(3 * 3600 + 5), "3h 0m 5s");
    }

    #[test]
    fn test_format_status() {
        let response = IpcResponse::Status {
            snap_enabled: true,
            explorer_enabled: false,
            hotkey: "Left Shift".to_string(),
            presses: 3,
            interval_ms: 1050,
            remembered_windows: 2,
            tracked_folders: 5,
            uptime_secs: 90,
        };
        let text = format_response(&Commands::Status, &response);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("enabled (Left Shift x3 within 1050 ms)"));
        assert!(lines[1].ends_with("disabled"));
        assert!(lines[2].ends_with(" 2"));
        assert!(lines[3].ends_with(" 5"));
        assert!(lines[4].ends_with("1m 30s"));
    }

    #[test]
    fn test_format_ok_uses_command_message() {
        let cmd = parse(&["explorer", "on"]).command;
        assert_eq!(
            format_response(&cmd, &IpcResponse::Ok),
            "Explorer view manager enabled"
        );
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(CONNECT_TIMEOUT < RESPONSE_TIMEOUT);
        assert!(RESPONSE_TIMEOUT.as_secs() <= 30);
    }
}
