//! Configuration management for reelcap.
//!
//! Handles loading and saving user configuration to platform-standard config directories:
//! - Linux: `~/.config/reelcap/config.json`
//! - macOS: `~/Library/Application Support/reelcap/config.json`
//! - Windows: `%APPDATA%\reelcap\config.json`

use crate::engine::RecorderSettings;
use crate::error::ConfigError;
use chrono::{DateTime, Local};
use directories::{ProjectDirs, UserDirs};
use reelcap_common::{CaptureMode, Resolution, VideoQuality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the folder created under the user's Videos directory.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "ScreenRecordings";

/// Recording-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingConfig {
    /// Default capture mode.
    #[serde(default)]
    pub mode: CaptureMode,
    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Quality preset; `custom` uses `bitrate`.
    #[serde(default)]
    pub quality: VideoQuality,
    /// Bitrate used when `quality` is `custom`.
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
    /// Output resolution preset.
    #[serde(default)]
    pub resolution: Resolution,
    /// Whether to count down before recording starts.
    #[serde(default)]
    pub countdown_enabled: bool,
    /// Countdown length in seconds.
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,
}

fn default_fps() -> u32 {
    30
}

fn default_bitrate() -> String {
    "8M".to_string()
}

fn default_countdown_seconds() -> u32 {
    3
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::FullScreen,
            fps: default_fps(),
            quality: VideoQuality::High,
            bitrate: default_bitrate(),
            resolution: Resolution::Native,
            countdown_enabled: false,
            countdown_seconds: default_countdown_seconds(),
        }
    }
}

/// Output-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Custom output directory. If None, uses system default (Videos folder).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Audio-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Record system audio through a loopback device.
    #[serde(default = "default_true")]
    pub system_enabled: bool,
    /// Record the microphone.
    #[serde(default = "default_true")]
    pub microphone_enabled: bool,
    /// Loopback device name. None means the host default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_device: Option<String>,
    /// Microphone device name. None means the host default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microphone_device: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            system_enabled: true,
            microphone_enabled: true,
            system_device: None,
            microphone_device: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Recording settings group.
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Output settings group.
    #[serde(default)]
    pub output: OutputConfig,
    /// Audio settings group.
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Resolved video encoding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub fps: u32,
    /// FFmpeg bitrate string, e.g. `"8M"`
    pub bitrate: String,
    /// Scaled output size; `None` keeps the capture size
    pub output_size: Option<(u32, u32)>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        RecordingConfig::default().video_settings()
    }
}

impl RecordingConfig {
    /// Resolve fps, bitrate and resolution presets.
    pub fn video_settings(&self) -> VideoSettings {
        let bitrate = match self.quality.bitrate() {
            Some(preset) => preset.to_string(),
            None if !self.bitrate.trim().is_empty() => self.bitrate.trim().to_string(),
            None => default_bitrate(),
        };

        VideoSettings {
            fps: if self.fps == 0 { default_fps() } else { self.fps },
            bitrate,
            output_size: self.resolution.dimensions(),
        }
    }
}

impl AppConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_settings(&self) -> VideoSettings {
        self.recording.video_settings()
    }

    /// Settings for a [`crate::engine::Recorder`] built from this config.
    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            video: self.video_settings(),
            system_audio: self.audio.system_enabled,
            microphone: self.audio.microphone_enabled,
            system_device: self.audio.system_device.clone(),
            microphone_device: self.audio.microphone_device.clone(),
        }
    }
}

/// Get the path to the config file.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs = ProjectDirs::from("", "", "reelcap").ok_or(ConfigError::NoConfigDir)?;
    Ok(proj_dirs.config_dir().join("config.json"))
}

/// Load configuration from disk.
/// Returns default config if file doesn't exist or is invalid.
pub fn load_config() -> AppConfig {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(e) => {
            warn!("Failed to get config path: {}", e);
            AppConfig::default()
        }
    }
}

/// Load configuration from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to parse config file: {}. Using defaults.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

/// Save configuration to disk.
/// Creates the config directory if it doesn't exist.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to an explicit path.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved config to {:?}", path);
    Ok(())
}

/// Get the default output directory (`<Videos>/ScreenRecordings`).
pub fn default_output_dir() -> PathBuf {
    let base = match UserDirs::new() {
        Some(user_dirs) => user_dirs
            .video_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| user_dirs.home_dir().join("Videos")),
        None => std::env::temp_dir(),
    };
    base.join(DEFAULT_OUTPUT_SUBDIR)
}

/// Get the configured output directory, falling back to default if not set.
pub fn output_dir(config: &AppConfig) -> PathBuf {
    match &config.output.directory {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_output_dir(),
    }
}

/// Deterministic output file name for a capture started at `timestamp`.
pub fn output_file_name(timestamp: &DateTime<Local>) -> String {
    format!(
        "ScreenRecording_{}.mp4",
        timestamp.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Output path for a recording starting now.
pub fn default_output_path(config: &AppConfig) -> PathBuf {
    output_dir(config).join(output_file_name(&Local::now()))
}
