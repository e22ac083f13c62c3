//! Shared types for capture, audio and recording state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest user-picked region edge, in pixels.
pub const MIN_REGION_SIZE: u32 = 100;

/// Information about a capturable window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Window ID (platform-specific)
    pub id: u32,
    /// Window title
    pub title: String,
    /// Owning application name
    pub app_name: String,
    /// Window X position (screen coordinates)
    #[serde(default)]
    pub x: i32,
    /// Window Y position (screen coordinates)
    #[serde(default)]
    pub y: i32,
    /// Window width in pixels
    #[serde(default)]
    pub width: u32,
    /// Window height in pixels
    #[serde(default)]
    pub height: u32,
}

/// Information about a display monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorInfo {
    /// Monitor ID (platform-specific)
    pub id: u32,
    /// Display name for UI
    pub name: String,
    /// Virtual screen X position
    pub x: i32,
    /// Virtual screen Y position
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether this is the primary monitor
    pub is_primary: bool,
}

/// Which kind of target a recording captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    FullScreen,
    Window,
    Region,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::FullScreen => "full_screen",
            CaptureMode::Window => "window",
            CaptureMode::Region => "region",
        }
    }

    /// Parse from string (case-insensitive, accepts `-` or `_`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full_screen" | "fullscreen" | "screen" => Some(CaptureMode::FullScreen),
            "window" => Some(CaptureMode::Window),
            "region" => Some(CaptureMode::Region),
            _ => None,
        }
    }
}

/// A capture target together with its mode-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CaptureTarget {
    /// A whole monitor. `None` selects the primary monitor.
    FullScreen { monitor: Option<u32> },
    /// The bounding rectangle of a foreign window.
    Window { id: u32 },
    /// A user-picked rectangle in screen pixels.
    Region {
        left: i32,
        top: i32,
        width: u32,
        height: u32,
    },
}

impl CaptureTarget {
    pub fn mode(&self) -> CaptureMode {
        match self {
            CaptureTarget::FullScreen { .. } => CaptureMode::FullScreen,
            CaptureTarget::Window { .. } => CaptureMode::Window,
            CaptureTarget::Region { .. } => CaptureMode::Region,
        }
    }
}

/// Rectangle of the screen being recorded, in screen pixels.
///
/// Fixed for the lifetime of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Byte length of one RGB24 frame of this region.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Round width and height down to even numbers, as required by 4:2:0 video.
    pub fn to_even(self) -> Self {
        Self {
            width: self.width & !1,
            height: self.height & !1,
            ..self
        }
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Label attached to every audio chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceLabel {
    /// Loopback capture of the system output
    System,
    /// Microphone input
    Microphone,
}

impl AudioSourceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioSourceLabel::System => "system",
            AudioSourceLabel::Microphone => "microphone",
        }
    }
}

/// Information about an audio device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    /// Device name as reported by the host
    pub name: String,
    /// Kind of device
    pub kind: AudioDeviceKind,
    /// Whether the host reports this as its default device of that kind
    #[serde(default)]
    pub is_default: bool,
}

/// Kind of audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioDeviceKind {
    /// Microphone or other audio input device
    Input,
    /// Output device, capturable as a loopback source
    Output,
}

/// Recording state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Not recording, ready to start
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused; the session stays open
    Paused,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "idle"),
            RecordingState::Recording => write!(f, "recording"),
            RecordingState::Paused => write!(f, "paused"),
        }
    }
}

/// Snapshot of a recording session's counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    pub state: RecordingState,
    /// Pause-aware elapsed recording time in seconds
    pub duration: f64,
    pub frames_written: u64,
    pub audio_chunks_written: u64,
    pub frame_write_failures: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// RMS level (0..1) of the most recently mixed system audio
    pub system_level: f32,
    /// RMS level (0..1) of the most recently mixed microphone audio
    pub microphone_level: f32,
}

/// Video quality preset, mapped onto an encoder bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    Medium,
    #[default]
    High,
    /// Use the explicitly configured bitrate
    Custom,
}

impl VideoQuality {
    /// Preset bitrate, or `None` for [`VideoQuality::Custom`].
    pub fn bitrate(&self) -> Option<&'static str> {
        match self {
            VideoQuality::Low => Some("2M"),
            VideoQuality::Medium => Some("5M"),
            VideoQuality::High => Some("8M"),
            VideoQuality::Custom => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(VideoQuality::Low),
            "medium" => Some(VideoQuality::Medium),
            "high" => Some(VideoQuality::High),
            "custom" => Some(VideoQuality::Custom),
            _ => None,
        }
    }
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Resolution {
    /// Keep the capture region's size
    #[default]
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl Resolution {
    /// Target output size, or `None` for [`Resolution::Native`].
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Resolution::Native => None,
            Resolution::P720 => Some((1280, 720)),
            Resolution::P1080 => Some((1920, 1080)),
            Resolution::P1440 => Some((2560, 1440)),
            Resolution::Uhd4k => Some((3840, 2160)),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "native" => Some(Resolution::Native),
            "720p" => Some(Resolution::P720),
            "1080p" => Some(Resolution::P1080),
            "1440p" => Some(Resolution::P1440),
            "4k" | "2160p" => Some(Resolution::Uhd4k),
            _ => None,
        }
    }
}
