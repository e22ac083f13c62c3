//! Frame capture.
//!
//! The recording engine pulls frames synchronously from a [`FrameSource`]
//! opened for a fixed [`CaptureRegion`]. The production source grabs the
//! screen through `xcap`; tests substitute their own sources.

pub mod convert;
pub mod region;
pub mod screen;

use crate::error::CaptureError;
use reelcap_common::{CaptureRegion, MonitorInfo, WindowInfo};

pub use region::resolve_region;
pub use screen::{ScreenCaptureBackend, ScreenDisplays, ScreenFrameSource};

/// An immutable RGB24 image, `width * height * 3` contiguous bytes.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap RGB24 bytes. Returns `None` if the length does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// An all-black frame matching `region`.
    pub fn black(region: &CaptureRegion) -> Self {
        Self {
            width: region.width,
            height: region.height,
            data: vec![0u8; region.frame_len()],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Pulls one frame of a fixed region on demand.
///
/// Only ever called from one thread at a time: the session's timing loop owns it.
pub trait FrameSource: Send {
    /// Capture the region now. `None` means a transient failure; the caller
    /// keeps recording.
    fn capture(&mut self) -> Option<Frame>;

    /// The region this source captures.
    fn region(&self) -> CaptureRegion;
}

/// Opens a fresh [`FrameSource`] for each recording session.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, region: &CaptureRegion) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Read-only view of the host's monitors and windows.
pub trait DisplayInfo {
    fn monitors(&self) -> Result<Vec<MonitorInfo>, crate::error::EnumerationError>;

    fn windows(&self) -> Result<Vec<WindowInfo>, crate::error::EnumerationError>;
}

/// List all connected monitors.
pub fn list_monitors() -> Vec<MonitorInfo> {
    ScreenDisplays.monitors().unwrap_or_default()
}

/// List all visible, capturable windows.
pub fn list_windows() -> Vec<WindowInfo> {
    ScreenDisplays.windows().unwrap_or_default()
}
