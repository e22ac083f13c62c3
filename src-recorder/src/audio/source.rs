//! The audio source seam and device enumeration.

use super::AudioChunk;
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait};
use reelcap_common::{AudioDeviceInfo, AudioDeviceKind};
use std::time::Duration;
use tracing::debug;

/// Channels that actually opened when an [`AudioSource`] started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveChannels {
    pub system: bool,
    pub microphone: bool,
}

impl ActiveChannels {
    pub fn any(&self) -> bool {
        self.system || self.microphone
    }
}

/// Produces labeled chunks from up to two capture sessions.
///
/// A channel that cannot be opened is disabled on its own; only a failure of
/// the source as a whole is an error.
pub trait AudioSource: Send + Sync {
    /// Open the requested channels and begin delivering chunks.
    fn start(&self, system: bool, microphone: bool) -> Result<ActiveChannels, AudioError>;

    /// Next queued chunk, waiting at most `timeout`.
    fn read_chunk(&self, timeout: Duration) -> Option<AudioChunk>;

    /// Tear down both sessions. Chunks still queued are discarded.
    fn stop(&self);
}

/// List input and output devices of the default host.
///
/// Output devices are listed because they can be opened as loopback sources.
pub fn list_audio_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();

    match host.input_devices() {
        Ok(inputs) => devices.extend(inputs.filter_map(|d| d.name().ok()).map(|name| {
            AudioDeviceInfo {
                is_default: default_input.as_deref() == Some(name.as_str()),
                name,
                kind: AudioDeviceKind::Input,
            }
        })),
        Err(e) => debug!("Failed to enumerate input devices: {}", e),
    }

    match host.output_devices() {
        Ok(outputs) => devices.extend(outputs.filter_map(|d| d.name().ok()).map(|name| {
            AudioDeviceInfo {
                is_default: default_output.as_deref() == Some(name.as_str()),
                name,
                kind: AudioDeviceKind::Output,
            }
        })),
        Err(e) => debug!("Failed to enumerate output devices: {}", e),
    }

    devices
}
