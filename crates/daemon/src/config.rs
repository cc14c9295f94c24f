//! Configuration management for the WinToolbox daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `%APPDATA%/wintoolbox/config.toml` (Windows standard)
//! 2. `~/.config/wintoolbox/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)
//!
//! A damaged file never prevents start-up: each field that is missing or
//! malformed falls back to its default and produces a [`ConfigWarning`].

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wintoolbox_core::press::interval_from_millis;
use wintoolbox_core::{ExplorerParams, KeyName, NudgePolicy, SnapParams, ViewMode};

/// Main configuration structure for WinToolbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Press-sequence snap & restore.
    pub snap: SnapConfig,
    /// Explorer view manager.
    pub explorer: ExplorerConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
}

/// Snap & restore configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Watched key, e.g. "Left Shift".
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// Presses that complete a sequence (1-10).
    #[serde(default = "default_presses")]
    pub presses: u32,

    /// Window the presses must fall in, in milliseconds (100-3000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Snapped width as a percentage of the monitor (10-100).
    #[serde(default = "default_pct")]
    pub width_pct: u32,

    /// Snapped height as a percentage of the monitor (10-100).
    #[serde(default = "default_pct")]
    pub height_pct: u32,

    /// Held at sequence completion to restore instead of snap.
    #[serde(default = "default_restore_modifier")]
    pub restore_modifier: String,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hotkey: default_hotkey(),
            presses: default_presses(),
            interval_ms: default_interval_ms(),
            width_pct: default_pct(),
            height_pct: default_pct(),
            restore_modifier: default_restore_modifier(),
        }
    }
}

/// Explorer view manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 1 large icons, 2 small icons, 3 list, 4 details, 5 tiles, 7 content.
    #[serde(default = "default_view_mode")]
    pub view_mode: u32,

    /// Canonical property name used for sorting (and grouping).
    #[serde(default = "default_sort_column")]
    pub sort_column: String,

    #[serde(default = "default_true")]
    pub sort_ascending: bool,

    #[serde(default = "default_false")]
    pub enable_grouping: bool,

    /// Reapply settings and nudge every cycle.
    #[serde(default = "default_true")]
    pub repeated_nudge: bool,

    /// Nudge once when the foreground Explorer window changes folder.
    #[serde(default = "default_true")]
    pub one_shot_nudge: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_nudge_count")]
    pub nudge_count: u32,

    #[serde(default = "default_nudge_delay_ms")]
    pub nudge_delay_ms: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            view_mode: default_view_mode(),
            sort_column: default_sort_column(),
            sort_ascending: true,
            enable_grouping: false,
            repeated_nudge: true,
            one_shot_nudge: true,
            poll_interval_ms: default_poll_interval_ms(),
            nudge_count: default_nudge_count(),
            nudge_delay_ms: default_nudge_delay_ms(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_hotkey() -> String {
    KeyName::LeftShift.as_str().to_string()
}

fn default_presses() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    1050
}

fn default_pct() -> u32 {
    76
}

fn default_restore_modifier() -> String {
    KeyName::Ctrl.as_str().to_string()
}

fn default_view_mode() -> u32 {
    ViewMode::DETAILS.0
}

fn default_sort_column() -> String {
    "System.ItemNameDisplay".to_string()
}

fn default_poll_interval_ms() -> u64 {
    4000
}

fn default_nudge_count() -> u32 {
    5
}

fn default_nudge_delay_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A configuration defect that was repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Dotted field path, e.g. `snap.presses`.
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of loading configuration from disk.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the configuration came from, if any.
    pub path: Option<PathBuf>,
    /// Parse-level repairs. Range repairs come from [`Config::validate`].
    pub warnings: Vec<ConfigWarning>,
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<LoadedConfig> {
        for path in config_paths() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(LoadedConfig {
            config: Self::default(),
            path: None,
            warnings: Vec::new(),
        })
    }

    /// Load configuration from a specific path.
    ///
    /// Only a read failure is an error; bad content is repaired.
    pub fn load_from_path(path: &Path) -> Result<LoadedConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let (config, warnings) = Self::from_toml_str(&content);
        Ok(LoadedConfig {
            config,
            path: Some(path.to_path_buf()),
            warnings,
        })
    }

    /// Parse TOML content field by field, defaulting anything unusable.
    pub fn from_toml_str(content: &str) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let root: toml::Table = match content.parse() {
            Ok(table) => table,
            Err(e) => {
                warnings.push(ConfigWarning::new(
                    "config",
                    format!("not valid TOML ({}), using defaults", e.message()),
                ));
                return (Self::default(), warnings);
            }
        };

        for key in root.keys() {
            if !matches!(key.as_str(), "snap" | "explorer" | "behavior") {
                warnings.push(ConfigWarning::new(key.as_str(), "unknown section ignored"));
            }
        }

        let snap_defaults = SnapConfig::default();
        let s = Section::new(&root, "snap", &mut warnings);
        let snap = SnapConfig {
            enabled: s.field("enabled", snap_defaults.enabled, &mut warnings),
            hotkey: s.field("hotkey", snap_defaults.hotkey, &mut warnings),
            presses: s.field("presses", snap_defaults.presses, &mut warnings),
            interval_ms: s.field("interval_ms", snap_defaults.interval_ms, &mut warnings),
            width_pct: s.field("width_pct", snap_defaults.width_pct, &mut warnings),
            height_pct: s.field("height_pct", snap_defaults.height_pct, &mut warnings),
            restore_modifier: s.field("restore_modifier", snap_defaults.restore_modifier, &mut warnings),
        };

        let ex_defaults = ExplorerConfig::default();
        let e = Section::new(&root, "explorer", &mut warnings);
        let explorer = ExplorerConfig {
            enabled: e.field("enabled", ex_defaults.enabled, &mut warnings),
            view_mode: e.field("view_mode", ex_defaults.view_mode, &mut warnings),
            sort_column: e.field("sort_column", ex_defaults.sort_column, &mut warnings),
            sort_ascending: e.field("sort_ascending", ex_defaults.sort_ascending, &mut warnings),
            enable_grouping: e.field("enable_grouping", ex_defaults.enable_grouping, &mut warnings),
            repeated_nudge: e.field("repeated_nudge", ex_defaults.repeated_nudge, &mut warnings),
            one_shot_nudge: e.field("one_shot_nudge", ex_defaults.one_shot_nudge, &mut warnings),
            poll_interval_ms: e.field("poll_interval_ms", ex_defaults.poll_interval_ms, &mut warnings),
            nudge_count: e.field("nudge_count", ex_defaults.nudge_count, &mut warnings),
            nudge_delay_ms: e.field("nudge_delay_ms", ex_defaults.nudge_delay_ms, &mut warnings),
        };

        let b = Section::new(&root, "behavior", &mut warnings);
        let behavior = BehaviorConfig {
            log_level: b.field("log_level", default_log_level(), &mut warnings),
        };

        (
            Self {
                snap,
                explorer,
                behavior,
            },
            warnings,
        )
    }

    /// Clamp out-of-range values and replace unknown names.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        clamp(&mut self.snap.presses, 1, 10, "snap.presses", &mut warnings);
        clamp(&mut self.snap.interval_ms, 100, 3000, "snap.interval_ms", &mut warnings);
        clamp(&mut self.snap.width_pct, 10, 100, "snap.width_pct", &mut warnings);
        clamp(&mut self.snap.height_pct, 10, 100, "snap.height_pct", &mut warnings);

        if KeyName::from_name(&self.snap.hotkey).is_none() {
            warnings.push(ConfigWarning::new(
                "snap.hotkey",
                format!("unknown key '{}', using '{}'", self.snap.hotkey, default_hotkey()),
            ));
            self.snap.hotkey = default_hotkey();
        }
        if KeyName::from_name(&self.snap.restore_modifier).is_none() {
            warnings.push(ConfigWarning::new(
                "snap.restore_modifier",
                format!(
                    "unknown key '{}', using '{}'",
                    self.snap.restore_modifier,
                    default_restore_modifier()
                ),
            ));
            self.snap.restore_modifier = default_restore_modifier();
        }

        if !ViewMode(self.explorer.view_mode).is_selectable() {
            warnings.push(ConfigWarning::new(
                "explorer.view_mode",
                format!("unsupported view mode {}, using details", self.explorer.view_mode),
            ));
            self.explorer.view_mode = default_view_mode();
        }
        if self.explorer.sort_column.trim().is_empty() {
            warnings.push(ConfigWarning::new("explorer.sort_column", "empty, using default"));
            self.explorer.sort_column = default_sort_column();
        }
        clamp(
            &mut self.explorer.poll_interval_ms,
            250,
            60_000,
            "explorer.poll_interval_ms",
            &mut warnings,
        );
        clamp(&mut self.explorer.nudge_count, 0, 20, "explorer.nudge_count", &mut warnings);
        clamp(&mut self.explorer.nudge_delay_ms, 0, 1000, "explorer.nudge_delay_ms", &mut warnings);

        let level = self.behavior.log_level.to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.behavior.log_level = level;
        } else {
            warnings.push(ConfigWarning::new(
                "behavior.log_level",
                format!("unknown level '{}', using 'info'", self.behavior.log_level),
            ));
            self.behavior.log_level = default_log_level();
        }

        warnings
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Snap parameters for the key-event context.
    pub fn snap_params(&self) -> SnapParams {
        SnapParams {
            enabled: self.snap.enabled,
            hotkey: KeyName::from_name(&self.snap.hotkey).unwrap_or(KeyName::LeftShift),
            presses: self.snap.presses,
            interval: interval_from_millis(self.snap.interval_ms),
            width_pct: self.snap.width_pct,
            height_pct: self.snap.height_pct,
            restore_modifier: KeyName::from_name(&self.snap.restore_modifier).unwrap_or(KeyName::Ctrl),
        }
    }

    /// Explorer parameters for the poll context.
    pub fn explorer_params(&self) -> ExplorerParams {
        ExplorerParams {
            enabled: self.explorer.enabled,
            view_mode: ViewMode(self.explorer.view_mode),
            sort_column: self.explorer.sort_column.clone(),
            sort_ascending: self.explorer.sort_ascending,
            enable_grouping: self.explorer.enable_grouping,
            repeated_nudge: self.explorer.repeated_nudge,
            one_shot_nudge: self.explorer.one_shot_nudge,
            nudge: NudgePolicy {
                count: self.explorer.nudge_count,
                delay: Duration::from_millis(self.explorer.nudge_delay_ms),
            },
        }
    }

    /// Time between Explorer poll cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.explorer.poll_interval_ms.max(1))
    }
}

/// One `[section]` of the raw TOML table.
struct Section<'a> {
    name: &'static str,
    table: Option<&'a toml::Table>,
}

impl<'a> Section<'a> {
    fn new(root: &'a toml::Table, name: &'static str, warnings: &mut Vec<ConfigWarning>) -> Self {
        let table = match root.get(name) {
            None => None,
            Some(toml::Value::Table(table)) => Some(table),
            Some(_) => {
                warnings.push(ConfigWarning::new(name, "not a table, using defaults"));
                None
            }
        };
        Self { name, table }
    }

    fn field<T: DeserializeOwned>(&self, key: &str, default: T, warnings: &mut Vec<ConfigWarning>) -> T {
        let Some(value) = self.table.and_then(|t| t.get(key)) else {
            return default;
        };
        match value.clone().try_into::<T>() {
            Ok(value) => value,
            Err(e) => {
                warnings.push(ConfigWarning::new(
                    format!("{}.{}", self.name, key),
                    format!("invalid value ({}), using default", e.message()),
                ));
                default
            }
        }
    }
}

fn clamp<T>(value: &mut T, min: T, max: T, field: &str, warnings: &mut Vec<ConfigWarning>)
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let clamped = if *value < min {
        min
    } else if *value > max {
        max
    } else {
        return;
    };
    warnings.push(ConfigWarning::new(
        field,
        format!("{} is outside {}..={}, using {}", value, min, max, clamped),
    ));
    *value = clamped;
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Windows standard: %APPDATA%/wintoolbox/config.toml
    if let Some(proj_dirs) = ProjectDirs::from("", "", "wintoolbox") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/wintoolbox/config.toml
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("wintoolbox").join("config.toml"));
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Where a new config file is written when none exists yet.
pub fn default_config_path() -> PathBuf {
    config_paths()
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
