//! `cpal`-based audio source.
//!
//! `cpal::Stream` is not `Send` on every host, so both streams are created,
//! played and dropped on one dedicated thread. The rest of the source talks to
//! that thread over a channel, and the streams' callbacks only touch the
//! shared [`ChunkQueue`].

use super::source::{ActiveChannels, AudioSource};
use super::{AudioChunk, ChunkQueue, CHANNELS, CHUNK_SAMPLES, SAMPLE_RATE};
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, SupportedStreamConfig};
use reelcap_common::AudioSourceLabel;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// How long `start` waits for the audio thread to report which streams opened.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle of the running audio thread.
struct CaptureThread {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Captures system audio (loopback) and microphone through `cpal`.
pub struct CpalAudioSource {
    queue: Arc<ChunkQueue>,
    system_device: Option<String>,
    microphone_device: Option<String>,
    thread: Mutex<Option<CaptureThread>>,
}

impl CpalAudioSource {
    /// Create a source using the named devices, or the host defaults when `None`.
    pub fn new(system_device: Option<String>, microphone_device: Option<String>) -> Self {
        Self {
            queue: Arc::new(ChunkQueue::default()),
            system_device,
            microphone_device,
            thread: Mutex::new(None),
        }
    }
}

impl Default for CpalAudioSource {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&self, system: bool, microphone: bool) -> Result<ActiveChannels, AudioError> {
        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(AudioError::ThreadFailed("audio capture already running".to_string()));
        }

        self.queue.clear();

        if !system && !microphone {
            return Ok(ActiveChannels::default());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<ActiveChannels>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let queue = Arc::clone(&self.queue);
        let system_device = self.system_device.clone();
        let microphone_device = self.microphone_device.clone();

        let handle = thread::Builder::new()
            .name("reelcap-audio".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                debug!("Audio host: {:?}", host.id());

                let system_stream = if system {
                    open_system_stream(&host, system_device.as_deref(), &queue)
                        .map_err(|e| warn!("System audio disabled: {}", e))
                        .ok()
                } else {
                    None
                };
                let mic_stream = if microphone {
                    open_microphone_stream(&host, microphone_device.as_deref(), &queue)
                        .map_err(|e| warn!("Microphone disabled: {}", e))
                        .ok()
                } else {
                    None
                };

                let active = ActiveChannels {
                    system: system_stream.is_some(),
                    microphone: mic_stream.is_some(),
                };
                let _ = ready_tx.send(active);

                if !active.any() {
                    return;
                }

                // Block until stop() or until the source is dropped
                let _ = stop_rx.recv();

                drop(system_stream);
                drop(mic_stream);
                debug!("Audio streams closed");
            })
            .map_err(|e| AudioError::ThreadFailed(e.to_string()))?;

        let active = match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(active) => active,
            Err(e) => {
                error!("Audio thread did not report readiness: {}", e);
                let _ = stop_tx.send(());
                return Err(AudioError::ThreadFailed(format!(
                    "audio thread did not start: {}",
                    e
                )));
            }
        };

        info!(
            system = active.system,
            microphone = active.microphone,
            "Audio capture started"
        );

        *slot = Some(CaptureThread { stop_tx, handle });
        Ok(active)
    }

    fn read_chunk(&self, timeout: Duration) -> Option<AudioChunk> {
        if timeout.is_zero() {
            self.queue.try_pop()
        } else {
            self.queue.pop_timeout(timeout)
        }
    }

    fn stop(&self) {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(thread) = thread {
            let _ = thread.stop_tx.send(());
            if thread.handle.join().is_err() {
                warn!("Audio thread panicked during shutdown");
            }
        }

        let dropped = self.queue.dropped();
        if dropped > 0 {
            warn!(dropped, "Audio chunks were dropped on queue overflow");
        }
        self.queue.clear();
    }
}

impl Drop for CpalAudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_system_stream(
    host: &cpal::Host,
    device_name: Option<&str>,
    queue: &Arc<ChunkQueue>,
) -> Result<cpal::Stream, AudioError> {
    let (device, loopback) = find_system_device(host, device_name)?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!(device = %name, loopback, "Opening system audio");
    open_stream(&device, loopback, AudioSourceLabel::System, queue)
}

fn open_microphone_stream(
    host: &cpal::Host,
    device_name: Option<&str>,
    queue: &Arc<ChunkQueue>,
) -> Result<cpal::Stream, AudioError> {
    let device = match device_name {
        Some(name) => find_device_by_name(host.input_devices().ok(), name)
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?,
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default input device".to_string()))?,
    };
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!(device = %name, "Opening microphone");
    open_stream(&device, false, AudioSourceLabel::Microphone, queue)
}

fn find_device_by_name<I>(devices: Option<I>, name: &str) -> Option<cpal::Device>
where
    I: Iterator<Item = cpal::Device>,
{
    devices?.find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

/// Locate the loopback-capable device. The flag tells whether the device is
/// an output that must be opened in loopback mode.
fn find_system_device(
    host: &cpal::Host,
    device_name: Option<&str>,
) -> Result<(cpal::Device, bool), AudioError> {
    if let Some(name) = device_name {
        if let Some(device) = find_device_by_name(host.output_devices().ok(), name) {
            return Ok((device, true));
        }
        if let Some(device) = find_device_by_name(host.input_devices().ok(), name) {
            return Ok((device, false));
        }
        return Err(AudioError::DeviceNotFound(name.to_string()));
    }

    // PulseAudio and PipeWire expose sink monitors as ordinary inputs
    if !cfg!(target_os = "windows") {
        let monitor = host.input_devices().ok().and_then(|mut devices| {
            devices.find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains("monitor"))
                    .unwrap_or(false)
            })
        });
        if let Some(device) = monitor {
            return Ok((device, false));
        }
    }

    host.default_output_device()
        .map(|d| (d, true))
        .ok_or_else(|| AudioError::DeviceNotFound("loopback device".to_string()))
}

/// Prefer 48 kHz stereo, falling back to the device default.
fn pick_config(device: &cpal::Device, loopback: bool) -> Result<SupportedStreamConfig, AudioError> {
    let ranges: Vec<_> = if loopback {
        device
            .supported_output_configs()
            .map(|c| c.collect())
            .unwrap_or_default()
    } else {
        device
            .supported_input_configs()
            .map(|c| c.collect())
            .unwrap_or_default()
    };

    let supports_target = |r: &&cpal::SupportedStreamConfigRange| {
        r.channels() == CHANNELS
            && r.min_sample_rate().0 <= SAMPLE_RATE
            && r.max_sample_rate().0 >= SAMPLE_RATE
    };

    let preferred = ranges
        .iter()
        .filter(supports_target)
        .find(|r| r.sample_format() == SampleFormat::F32)
        .or_else(|| ranges.iter().find(supports_target));

    if let Some(range) = preferred {
        return Ok(range.clone().with_sample_rate(SampleRate(SAMPLE_RATE)));
    }

    let default = if loopback {
        device.default_output_config()
    } else {
        device.default_input_config()
    };
    default.map_err(|e| AudioError::StreamFailed(e.to_string()))
}

fn open_stream(
    device: &cpal::Device,
    loopback: bool,
    label: AudioSourceLabel,
    queue: &Arc<ChunkQueue>,
) -> Result<cpal::Stream, AudioError> {
    let supported = pick_config(device, loopback)?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    debug!(
        source = label.as_str(),
        rate = config.sample_rate.0,
        channels = config.channels,
        format = ?sample_format,
        "Audio stream format"
    );

    let mut assembler = ChunkAssembler::new(
        label,
        config.channels,
        config.sample_rate.0,
        Arc::clone(queue),
    );
    let err_fn = move |err| warn!("Audio stream error on {}: {}", label.as_str(), err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| assembler.push_f32(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| assembler.push_i16(data),
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::StreamFailed(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| AudioError::StreamFailed(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFailed(e.to_string()))?;

    Ok(stream)
}

/// Turns arbitrary callback buffers into fixed-size 48 kHz stereo chunks.
///
/// Extra channels are dropped, mono is duplicated, and other sample rates
/// are converted by nearest-sample picking.
pub(crate) struct ChunkAssembler {
    label: AudioSourceLabel,
    channels: usize,
    /// Output frames owed per input frame
    step: f64,
    phase: f64,
    pending: Vec<i16>,
    queue: Arc<ChunkQueue>,
}

impl ChunkAssembler {
    pub(crate) fn new(
        label: AudioSourceLabel,
        channels: u16,
        sample_rate: u32,
        queue: Arc<ChunkQueue>,
    ) -> Self {
        Self {
            label,
            channels: channels.max(1) as usize,
            step: SAMPLE_RATE as f64 / sample_rate.max(1) as f64,
            phase: 0.0,
            pending: Vec::with_capacity(CHUNK_SAMPLES * 2),
            queue,
        }
    }

    pub(crate) fn push_f32(&mut self, data: &[f32]) {
        let converted: Vec<i16> = data.iter().map(|&s| super::f32_to_i16(s)).collect();
        self.push_i16(&converted);
    }

    pub(crate) fn push_i16(&mut self, data: &[i16]) {
        for frame in data.chunks_exact(self.channels) {
            let left = frame[0];
            let right = frame.get(1).copied().unwrap_or(left);

            self.phase += self.step;
            while self.phase >= 1.0 {
                self.pending.push(left);
                self.pending.push(right);
                self.phase -= 1.0;
            }
        }

        while self.pending.len() >= CHUNK_SAMPLES {
            let samples: Vec<i16> = self.pending.drain(..CHUNK_SAMPLES).collect();
            if !self.queue.push(AudioChunk::new(self.label, samples)) {
                trace!(source = self.label.as_str(), "Audio queue full, dropped oldest chunk");
            }
        }
    }
}
