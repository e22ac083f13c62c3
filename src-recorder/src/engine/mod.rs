//! Recording engine: the session state machine.
//!
//! `Idle -> Recording <-> Paused -> Idle`. Each session runs one dedicated
//! timing-loop thread that owns the frame source, the encoder and the WAV
//! writer. `stop` waits for that thread to hand them back before the encoder
//! pipe is closed, then finalizes the temporary files into the output.
//!
//! A loop that misses the join timeout keeps its session: the session is
//! finalized on a background thread once the loop hands its resources back,
//! and `start` is refused until then.
//!
//! Observers subscribe to [`RecorderEvent`]s on a broadcast channel.

pub mod clock;
pub mod finalize;
mod state;
mod timing;

use crate::audio::{ActiveChannels, AudioSource, CpalAudioSource, CHANNELS, SAMPLE_RATE};
use crate::capture::{CaptureBackend, ScreenCaptureBackend};
use crate::config::VideoSettings;
use crate::encoder::{EncoderSettings, FfmpegEncoder, FfmpegMuxer, Muxer, VideoEncoder, WavWriter};
use crate::error::{CaptureError, RecorderError};
use reelcap_common::{CaptureRegion, RecordingState, RecordingStats};
use state::Shared;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use timing::{LoopResources, TimingLoop};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use finalize::{FinalizeOutcome, TempPaths};

/// Default bound on waiting for the timing loop to exit in `stop`.
pub const LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 100;

/// Creates a fresh encoder for each session.
pub type EncoderFactory = Arc<dyn Fn() -> Box<dyn VideoEncoder> + Send + Sync>;

/// Per-recorder configuration, fixed across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    pub video: VideoSettings,
    pub system_audio: bool,
    pub microphone: bool,
    /// Loopback device name; host default when `None`
    pub system_device: Option<String>,
    /// Input device name; host default when `None`
    pub microphone_device: Option<String>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            video: VideoSettings::default(),
            system_audio: true,
            microphone: true,
            system_device: None,
            microphone_device: None,
        }
    }
}

/// Events broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Recording state changed
    StateChanged(RecordingState),
    /// Duration tick, at most every 250 ms while recording
    Progress { duration: f64, frames_written: u64 },
    /// A session was finalized
    Finalized(Result<SessionSummary, String>),
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub output: PathBuf,
    pub outcome: FinalizeOutcome,
    /// Whether the encoder exited cleanly
    pub encoder_ok: bool,
    pub duration: f64,
    pub frames_written: u64,
    pub frame_write_failures: u64,
    pub audio_chunks_written: u64,
}

impl SessionSummary {
    pub fn has_audio(&self) -> bool {
        self.outcome.has_audio()
    }
}

/// A running session's handles, owned by the recorder.
struct Session {
    handle: JoinHandle<()>,
    done_rx: mpsc::Receiver<LoopResources>,
    files: SessionFiles,
}

/// Where a session records to.
struct SessionFiles {
    paths: TempPaths,
    output: PathBuf,
    audio_active: bool,
}

/// Closes a session's sinks and produces its output. Owns only shared
/// handles so it can run on a background thread.
struct Finisher {
    audio: Arc<dyn AudioSource>,
    muxer: Arc<dyn Muxer>,
    shared: Arc<Shared>,
    events: broadcast::Sender<RecorderEvent>,
    last_error: Arc<Mutex<Option<String>>>,
    last_output: Arc<Mutex<Option<SessionSummary>>>,
}

impl Finisher {
    /// Stop the encoder, then audio, then the WAV writer, then finalize.
    ///
    /// `resources` is `None` when the loop died without handing them back.
    fn finish(&self, files: SessionFiles, resources: Option<LoopResources>, duration: f64) -> bool {
        let encoder_ok = match resources {
            Some(mut resources) => {
                let encoder_ok = resources.encoder.stop();
                if files.audio_active {
                    self.audio.stop();
                }
                if let Some(wav) = resources.wav.take() {
                    if let Err(e) = wav.finish() {
                        warn!("Failed to finalize audio file: {}", e);
                    }
                }
                encoder_ok
            }
            None => {
                if files.audio_active {
                    self.audio.stop();
                }
                false
            }
        };

        let counters = &self.shared.counters;
        let result = finalize::finalize(&files.paths, &files.output, self.muxer.as_ref()).map(
            |outcome| SessionSummary {
                output: files.output.clone(),
                outcome,
                encoder_ok,
                duration,
                frames_written: counters.frames(),
                frame_write_failures: counters.frame_write_failures.load(Ordering::SeqCst),
                audio_chunks_written: counters.audio_chunks_written.load(Ordering::SeqCst),
            },
        );

        match result {
            Ok(summary) => {
                info!(
                    frames = summary.frames_written,
                    duration = summary.duration,
                    audio = summary.has_audio(),
                    "Recording stopped"
                );
                *lock(&self.last_output) = Some(summary.clone());
                let _ = self.events.send(RecorderEvent::Finalized(Ok(summary)));
                true
            }
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                *lock(&self.last_error) = Some(e.to_string());
                let _ = self.events.send(RecorderEvent::Finalized(Err(e.to_string())));
                false
            }
        }
    }
}

fn lock<T>(slot: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Records a screen region to a video file.
///
/// Every operation takes `&self`; share the recorder in an `Arc` to drive it
/// from several threads.
pub struct Recorder {
    settings: RecorderSettings,
    capture: Arc<dyn CaptureBackend>,
    audio: Arc<dyn AudioSource>,
    encoder_factory: EncoderFactory,
    muxer: Arc<dyn Muxer>,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    audio_channels: Mutex<ActiveChannels>,
    events: broadcast::Sender<RecorderEvent>,
    last_error: Arc<Mutex<Option<String>>>,
    last_output: Arc<Mutex<Option<SessionSummary>>>,
    join_timeout: Duration,
}

impl Recorder {
    /// A recorder backed by the screen, `cpal` and FFmpeg.
    pub fn new(settings: RecorderSettings) -> Self {
        let audio = CpalAudioSource::new(
            settings.system_device.clone(),
            settings.microphone_device.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            settings,
            capture: Arc::new(ScreenCaptureBackend),
            audio: Arc::new(audio),
            encoder_factory: Arc::new(|| Box::new(FfmpegEncoder::new()) as Box<dyn VideoEncoder>),
            muxer: Arc::new(FfmpegMuxer),
            clock: Arc::new(SystemClock),
            shared: Arc::new(Shared::default()),
            session: Mutex::new(None),
            audio_channels: Mutex::new(ActiveChannels::default()),
            events,
            last_error: Arc::new(Mutex::new(None)),
            last_output: Arc::new(Mutex::new(None)),
            join_timeout: LOOP_JOIN_TIMEOUT,
        }
    }

    pub fn with_capture_backend(mut self, capture: Arc<dyn CaptureBackend>) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_audio_source(mut self, audio: Arc<dyn AudioSource>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_encoder_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn VideoEncoder> + Send + Sync + 'static,
    {
        self.encoder_factory = Arc::new(factory);
        self
    }

    pub fn with_muxer(mut self, muxer: Arc<dyn Muxer>) -> Self {
        self.muxer = muxer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long `stop` waits for the timing loop before finalizing in the background.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Subscribe to recorder events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    fn broadcast(&self, event: RecorderEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.events.send(event);
    }

    /// Get the current recording state.
    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    /// Pause-aware recording time in seconds; 0 while idle.
    pub fn get_duration(&self) -> f64 {
        let now = self.clock.now();
        self.shared.control().elapsed(now).as_secs_f64()
    }

    /// Whether a stopped session is still waiting on its timing loop.
    pub fn is_finalizing(&self) -> bool {
        self.shared.is_finalizing()
    }

    /// Audio channels that opened for the current or last session.
    pub fn audio_channels(&self) -> ActiveChannels {
        *lock(&self.audio_channels)
    }

    /// Reason of the last failed operation, if any.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Result of the last finalized session.
    pub fn last_output(&self) -> Option<SessionSummary> {
        lock(&self.last_output).clone()
    }

    fn set_last_error(&self, err: &RecorderError) {
        *lock(&self.last_error) = Some(err.to_string());
    }

    fn finisher(&self) -> Finisher {
        Finisher {
            audio: Arc::clone(&self.audio),
            muxer: Arc::clone(&self.muxer),
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            last_error: Arc::clone(&self.last_error),
            last_output: Arc::clone(&self.last_output),
        }
    }

    /// Snapshot of the session counters. Counters of a finished session stay
    /// readable until the next `start`.
    pub fn statistics(&self) -> RecordingStats {
        let now = self.clock.now();
        let (state, duration, fps, region) = {
            let control = self.shared.control();
            (
                control.state,
                control.elapsed(now).as_secs_f64(),
                control.fps,
                control.region,
            )
        };
        let levels = self.shared.levels();
        let counters = &self.shared.counters;

        RecordingStats {
            state,
            duration,
            frames_written: counters.frames(),
            audio_chunks_written: counters.audio_chunks_written.load(Ordering::SeqCst),
            frame_write_failures: counters.frame_write_failures.load(Ordering::SeqCst),
            fps,
            width: region.map(|r| r.width).unwrap_or(0),
            height: region.map(|r| r.height).unwrap_or(0),
            system_level: levels.system,
            microphone_level: levels.microphone,
        }
    }

    /// Start recording `region` into `output`. Only valid while idle.
    pub fn start(&self, region: CaptureRegion, output: impl AsRef<Path>) -> bool {
        match self.try_start(region, output.as_ref()) {
            Ok(()) => {
                *lock(&self.last_error) = None;
                true
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.set_last_error(&e);
                false
            }
        }
    }

    fn try_start(&self, region: CaptureRegion, output: &Path) -> Result<(), RecorderError> {
        let mut slot = lock(&self.session);

        if self.shared.is_finalizing() {
            return Err(RecorderError::StillFinalizing);
        }
        let state = self.shared.state();
        if state != RecordingState::Idle || slot.is_some() {
            return Err(RecorderError::InvalidState {
                operation: "start",
                state,
            });
        }

        let region = region.to_even();
        if region.is_empty() {
            return Err(CaptureError::InvalidRegion(format!("{} has no area", region)).into());
        }

        let video = &self.settings.video;
        let encoder_settings = EncoderSettings {
            width: region.width,
            height: region.height,
            fps: video.fps,
            bitrate: video.bitrate.clone(),
            output_size: video.output_size,
        };
        encoder_settings.validate()?;

        if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| RecorderError::File {
                what: "output directory",
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let paths = TempPaths::for_output(output);
        let source = self.capture.open(&region)?;

        let mut encoder = (self.encoder_factory)();
        if let Err(e) = encoder.start(&encoder_settings, &paths.video) {
            paths.cleanup();
            return Err(e.into());
        }

        let (wav, channels) = match self.start_audio(&paths) {
            Ok(audio) => audio,
            Err(e) => {
                let _ = encoder.stop();
                paths.cleanup();
                return Err(e);
            }
        };
        *lock(&self.audio_channels) = channels;
        let audio_active = wav.is_some();

        self.shared.counters.reset();
        self.shared.set_levels(Default::default());
        let generation = self
            .shared
            .control()
            .begin(self.clock.now(), video.fps, region);

        let (done_tx, done_rx) = mpsc::channel();
        let timing_loop = TimingLoop {
            shared: Arc::clone(&self.shared),
            clock: Arc::clone(&self.clock),
            audio: Arc::clone(&self.audio),
            events: self.events.clone(),
            resources: LoopResources {
                source,
                encoder,
                wav,
            },
            generation,
        };

        let spawned = thread::Builder::new()
            .name("reelcap-timing".to_string())
            .spawn(move || {
                let resources = timing_loop.run();
                let _ = done_tx.send(resources);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // The closure and every resource it owned are already dropped
                self.shared.control().end();
                self.audio.stop();
                paths.cleanup();
                return Err(RecorderError::Thread(e));
            }
        };

        info!(
            region = %region,
            fps = video.fps,
            audio = audio_active,
            "Recording started -> {:?}",
            output
        );

        *slot = Some(Session {
            handle,
            done_rx,
            files: SessionFiles {
                paths,
                output: output.to_path_buf(),
                audio_active,
            },
        });
        drop(slot);

        self.broadcast(RecorderEvent::StateChanged(RecordingState::Recording));
        Ok(())
    }

    /// Start the requested audio channels and open the WAV sink if any did.
    fn start_audio(
        &self,
        paths: &TempPaths,
    ) -> Result<(Option<WavWriter>, ActiveChannels), RecorderError> {
        let (system, microphone) = (self.settings.system_audio, self.settings.microphone);
        if !system && !microphone {
            return Ok((None, ActiveChannels::default()));
        }

        let channels = match self.audio.start(system, microphone) {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Audio unavailable, recording video only: {}", e);
                return Ok((None, ActiveChannels::default()));
            }
        };

        if system && !channels.system {
            warn!("System audio requested but unavailable");
        }
        if microphone && !channels.microphone {
            warn!("Microphone requested but unavailable");
        }

        if !channels.any() {
            self.audio.stop();
            return Ok((None, channels));
        }

        match WavWriter::create(&paths.audio, SAMPLE_RATE, CHANNELS) {
            Ok(wav) => Ok((Some(wav), channels)),
            Err(source) => {
                self.audio.stop();
                Err(RecorderError::File {
                    what: "audio file",
                    path: paths.audio.clone(),
                    source,
                })
            }
        }
    }

    /// Pause recording. Only valid while recording.
    pub fn pause(&self) -> bool {
        {
            let mut control = self.shared.control();
            if control.state != RecordingState::Recording {
                debug!("Ignoring pause while {}", control.state);
                return false;
            }
            control.pause_started_at = Some(self.clock.now());
            control.state = RecordingState::Paused;
        }
        self.shared.wake.notify_all();

        info!("Recording paused");
        self.broadcast(RecordingState::Paused.into());
        true
    }

    /// Resume recording. Only valid while paused.
    pub fn resume(&self) -> bool {
        {
            let mut control = self.shared.control();
            if control.state != RecordingState::Paused {
                debug!("Ignoring resume while {}", control.state);
                return false;
            }
            let now = self.clock.now();
            if let Some(paused_at) = control.pause_started_at.take() {
                control.accumulated_pause += now.saturating_duration_since(paused_at);
            }
            control.state = RecordingState::Recording;
        }
        self.shared.wake.notify_all();

        info!("Recording resumed");
        self.broadcast(RecordingState::Recording.into());
        true
    }

    /// Stop recording and finalize the output. Valid while recording or paused.
    ///
    /// Returns `false` for an invalid state, when no output could be produced
    /// at all, or when the timing loop missed the join timeout. In the last
    /// case the session is finalized once the loop exits, announced by a
    /// [`RecorderEvent::Finalized`].
    pub fn stop(&self) -> bool {
        let mut slot = lock(&self.session);

        let duration = {
            let mut control = self.shared.control();
            if control.state == RecordingState::Idle {
                debug!("Ignoring stop while idle");
                return false;
            }
            let duration = control.elapsed(self.clock.now()).as_secs_f64();
            // Idle is the loop's termination signal
            control.end();
            duration
        };
        self.shared.wake.notify_all();
        self.broadcast(RecordingState::Idle.into());

        // Held through finalization so a concurrent start waits
        let Some(Session {
            handle,
            done_rx,
            files,
        }) = slot.take()
        else {
            return false;
        };

        let finisher = self.finisher();
        match done_rx.recv_timeout(self.join_timeout) {
            Ok(resources) => {
                if handle.join().is_err() {
                    warn!("Timing loop panicked after handing back its resources");
                }
                finisher.finish(files, Some(resources), duration)
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Timing loop exited without handing back its resources");
                let _ = handle.join();
                finisher.finish(files, None, duration)
            }
            Err(RecvTimeoutError::Timeout) => {
                let err = RecorderError::LoopTimeout(self.join_timeout);
                error!("{}", err);
                self.set_last_error(&err);
                self.finish_in_background(finisher, handle, done_rx, files, duration);
                false
            }
        }
    }

    /// Finalize once the stuck loop hands its resources back. The encoder
    /// still belongs to the loop, so nothing is renamed before then.
    fn finish_in_background(
        &self,
        finisher: Finisher,
        handle: JoinHandle<()>,
        done_rx: mpsc::Receiver<LoopResources>,
        files: SessionFiles,
        duration: f64,
    ) {
        self.shared.finalizing.store(true, Ordering::SeqCst);
        let paths = files.paths.clone();
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("reelcap-finalize".to_string())
            .spawn(move || {
                let resources = done_rx.recv().ok();
                if handle.join().is_err() {
                    warn!("Timing loop panicked");
                }
                finisher.finish(files, resources, duration);
                shared.finalizing.store(false, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            // The loop drops its encoder once it sees its session has ended
            error!("Failed to spawn finalizer thread, discarding session: {}", e);
            paths.cleanup();
            self.shared.finalizing.store(false, Ordering::SeqCst);
        }
    }
}

impl From<RecordingState> for RecorderEvent {
    fn from(state: RecordingState) -> Self {
        RecorderEvent::StateChanged(state)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.state() != RecordingState::Idle {
            warn!("Recorder dropped while {}, finalizing", self.state());
            self.stop();
        }
    }
}
