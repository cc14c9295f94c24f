//! WinToolbox IPC Protocol
//!
//! Shared types for daemon-CLI communication over a Windows named pipe.
//! Each request and each response is one line of JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named pipe path for IPC communication.
pub const PIPE_NAME: &str = r"\\.\pipe\wintoolbox";

/// Upper bound on a single message line, in bytes.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Commands that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Report feature state and counters.
    QueryStatus,
    /// Enable or disable snap & restore.
    SetSnapEnabled { enabled: bool },
    /// Enable or disable the Explorer view manager.
    SetExplorerEnabled { enabled: bool },
    /// Reload configuration from file.
    Reload,
    /// Stop the daemon.
    Stop,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Status query response.
    Status {
        snap_enabled: bool,
        explorer_enabled: bool,
        /// Watched key, as written in configuration.
        hotkey: String,
        presses: u32,
        interval_ms: u64,
        /// Windows with a captured pre-snap geometry.
        remembered_windows: usize,
        /// Explorer windows with a known folder path.
        tracked_folders: usize,
        uptime_secs: u64,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Wire-format failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message of {0} bytes exceeds the {max} byte limit", max = MAX_IPC_MESSAGE_SIZE)]
    TooLarge(usize),

    #[error("Empty message")]
    Empty,

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `message` as one newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(line.len()));
    }
    Ok(line)
}

/// Parse one line received from the pipe. Surrounding whitespace is ignored.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(line.len()));
    }
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = IpcCommand::QueryStatus;
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"type":"query_status"}"#);

        let cmd2: IpcCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_toggle_command_serialization() {
        let cmd = IpcCommand::SetExplorerEnabled { enabled: false };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("set_explorer_enabled"));
        assert!(json.contains("\"enabled\":false"));

        let cmd2: IpcCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_response_serialization() {
        let resp = IpcResponse::Ok;
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);

        let resp2: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_status_serialization() {
        let resp = IpcResponse::Status {
            snap_enabled: true,
            explorer_enabled: false,
            hotkey: "Left Shift".to_string(),
            presses: 3,
            interval_ms: 1050,
            remembered_windows: 2,
            tracked_folders: 4,
            uptime_secs: 60,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"status\""));
        assert!(json.contains("\"hotkey\":\"Left Shift\""));

        let resp2: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_error_response() {
        let resp = IpcResponse::error("Something went wrong");
        if let IpcResponse::Error { message } = resp {
            assert_eq!(message, "Something went wrong");
        } else {
            panic!("Expected Error response");
        }
    }

    #[test]
    fn test_encode_line_is_newline_terminated() {
        let line = encode_line(&IpcCommand::Reload).unwrap();
        assert_eq!(line, "{\"type\":\"reload\"}\n");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_decode_line_trims_newline() {
        let cmd: IpcCommand = decode_line("{\"type\":\"stop\"}\r\n").unwrap();
        assert_eq!(cmd, IpcCommand::Stop);
    }

    #[test]
    fn test_decode_line_rejects_empty_and_oversized() {
        assert!(matches!(decode_line::<IpcCommand>("  \n"), Err(ProtocolError::Empty)));

        let huge = "x".repeat(MAX_IPC_MESSAGE_SIZE + 1);
        assert!(matches!(
            decode_line::<IpcCommand>(&huge),
            Err(ProtocolError::TooLarge(_))
        ));
    }

    #[test]
    fn test_invalid_json_handling() {
        let result: Result<IpcCommand, _> = decode_line("not valid json");
        assert!(matches!(result, Err(ProtocolError::Json(_))));

        let result: Result<IpcCommand, _> = decode_line("{\"type\": \"focus_left\"}");
        assert!(result.is_err());

        let result: Result<IpcCommand, _> = decode_line("{\"type\": \"set_snap_enabled\"}");
        assert!(result.is_err(), "missing field must be rejected");

        let result: Result<IpcResponse, _> = decode_line("{\"status\": \"invalid\"}");
        assert!(result.is_err());
    }

    #[test]
    fn test_pipe_name_format() {
        assert!(PIPE_NAME.starts_with(r"\\.\pipe\"));
        assert_eq!(PIPE_NAME, r"\\.\pipe\wintoolbox");
    }
}
