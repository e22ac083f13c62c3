//! End-to-end tests of the recording engine with in-memory collaborators.

use reelcap_lib::audio::{ActiveChannels, AudioChunk, AudioSource, CHUNK_SAMPLES};
use reelcap_lib::capture::{CaptureBackend, Frame, FrameSource};
use reelcap_lib::common::{AudioSourceLabel, CaptureRegion, RecordingState};
use reelcap_lib::config::VideoSettings;
use reelcap_lib::encoder::{EncoderSettings, Muxer, VideoEncoder};
use reelcap_lib::engine::{FinalizeOutcome, ManualClock};
use reelcap_lib::error::{AudioError, CaptureError, EncoderError};
use reelcap_lib::{Recorder, RecorderEvent, RecorderSettings};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

// --- Fakes ---

/// Reports that a capture started, then holds it until released.
type CaptureGate = (Sender<()>, Receiver<()>);

struct FakeCapture {
    fail_every_capture: bool,
    /// Handed to the first source opened
    gate: Mutex<Option<CaptureGate>>,
}

impl CaptureBackend for FakeCapture {
    fn open(&self, region: &CaptureRegion) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(FakeSource {
            region: *region,
            fail: self.fail_every_capture,
            captures: 0,
            gate: self.gate.lock().unwrap().take(),
        }))
    }
}

struct FakeSource {
    region: CaptureRegion,
    fail: bool,
    captures: u8,
    gate: Option<CaptureGate>,
}

impl FrameSource for FakeSource {
    fn capture(&mut self) -> Option<Frame> {
        if let Some((entered, release)) = self.gate.take() {
            entered.send(()).unwrap();
            let _ = release.recv();
        }
        if self.fail {
            return None;
        }
        self.captures = self.captures.wrapping_add(1);
        Frame::from_rgb(
            self.region.width,
            self.region.height,
            vec![self.captures; self.region.frame_len()],
        )
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

#[derive(Default)]
struct EncoderLog {
    frames: AtomicU64,
    rejected: AtomicU64,
    stopped: AtomicBool,
    /// Contents of the video file when the encoder stopped
    snapshot: Mutex<Option<Vec<u8>>>,
}

struct FakeEncoder {
    log: Arc<EncoderLog>,
    file: Option<File>,
    path: Option<PathBuf>,
    frame_len: usize,
    fail_start: bool,
    fail_writes_after: Option<u64>,
}

impl VideoEncoder for FakeEncoder {
    fn start(&mut self, settings: &EncoderSettings, output: &Path) -> Result<(), EncoderError> {
        if self.fail_start {
            return Err(EncoderError::NotFound);
        }
        let mut file = File::create(output).map_err(EncoderError::SpawnFailed)?;
        file.write_all(b"HEADER").map_err(EncoderError::SpawnFailed)?;
        self.file = Some(file);
        self.path = Some(output.to_path_buf());
        self.frame_len = settings.frame_len();
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> bool {
        if frame.data().len() != self.frame_len {
            self.log.rejected.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        let written = self.log.frames.load(Ordering::SeqCst);
        if self.fail_writes_after.is_some_and(|limit| written >= limit) {
            return false;
        }
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        // One marker byte per frame keeps the file small
        if file.write_all(&[frame.data()[0]]).is_err() {
            return false;
        }
        self.log.frames.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn stop(&mut self) -> bool {
        if let Some(mut file) = self.file.take() {
            file.flush().unwrap();
        }
        if let Some(path) = &self.path {
            *self.log.snapshot.lock().unwrap() = Some(fs::read(path).unwrap());
        }
        self.log.stopped.store(true, Ordering::SeqCst);
        true
    }
}

struct FakeAudio {
    queue: Mutex<VecDeque<AudioChunk>>,
    microphone_fails: bool,
    system_chunks: usize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeAudio {
    fn new(system_chunks: usize, microphone_fails: bool) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            microphone_fails,
            system_chunks,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    fn push_system(&self, count: usize) {
        let mut queue = self.queue.lock().unwrap();
        for _ in 0..count {
            queue.push_back(AudioChunk::new(
                AudioSourceLabel::System,
                vec![8_000; CHUNK_SAMPLES],
            ));
        }
    }

    fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

impl AudioSource for FakeAudio {
    fn start(&self, system: bool, microphone: bool) -> Result<ActiveChannels, AudioError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let active = ActiveChannels {
            system,
            microphone: microphone && !self.microphone_fails,
        };
        if active.system {
            self.push_system(self.system_chunks);
        }
        Ok(active)
    }

    fn read_chunk(&self, _timeout: Duration) -> Option<AudioChunk> {
        self.queue.lock().unwrap().pop_front()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().unwrap().clear();
    }
}

struct FakeMuxer {
    succeed: bool,
    calls: AtomicUsize,
}

impl Muxer for FakeMuxer {
    fn merge(&self, video: &Path, _audio: &Path, output: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return false;
        }
        let mut bytes = fs::read(video).unwrap();
        bytes.extend_from_slice(b"+AUDIO");
        fs::write(output, bytes).unwrap();
        true
    }
}

// --- Harness ---

struct Harness {
    recorder: Recorder,
    clock: ManualClock,
    encoder: Arc<EncoderLog>,
    audio: Arc<FakeAudio>,
    muxer: Arc<FakeMuxer>,
    dir: PathBuf,
}

struct Options {
    system_audio: bool,
    microphone: bool,
    microphone_fails: bool,
    merge_succeeds: bool,
    capture_fails: bool,
    encoder_start_fails: bool,
    fail_writes_after: Option<u64>,
    capture_gate: Option<CaptureGate>,
    join_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            system_audio: false,
            microphone: false,
            microphone_fails: false,
            merge_succeeds: true,
            capture_fails: false,
            encoder_start_fails: false,
            fail_writes_after: None,
            capture_gate: None,
            join_timeout: None,
        }
    }
}

impl Harness {
    fn new(name: &str, options: Options) -> Self {
        let dir = std::env::temp_dir().join(format!("reelcap-engine-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let settings = RecorderSettings {
            video: VideoSettings {
                fps: 30,
                bitrate: "8M".to_string(),
                output_size: None,
            },
            system_audio: options.system_audio,
            microphone: options.microphone,
            system_device: None,
            microphone_device: None,
        };

        let clock = ManualClock::new();
        let encoder = Arc::new(EncoderLog::default());
        let audio = Arc::new(FakeAudio::new(3, options.microphone_fails));
        let muxer = Arc::new(FakeMuxer {
            succeed: options.merge_succeeds,
            calls: AtomicUsize::new(0),
        });

        let log = Arc::clone(&encoder);
        let fail_start = options.encoder_start_fails;
        let fail_writes_after = options.fail_writes_after;
        let mut recorder = Recorder::new(settings)
            .with_capture_backend(Arc::new(FakeCapture {
                fail_every_capture: options.capture_fails,
                gate: Mutex::new(options.capture_gate),
            }))
            .with_audio_source(Arc::clone(&audio) as Arc<dyn AudioSource>)
            .with_encoder_factory(move || {
                Box::new(FakeEncoder {
                    log: Arc::clone(&log),
                    file: None,
                    path: None,
                    frame_len: 0,
                    fail_start,
                    fail_writes_after,
                }) as Box<dyn VideoEncoder>
            })
            .with_muxer(Arc::clone(&muxer) as Arc<dyn Muxer>)
            .with_clock(Arc::new(clock.clone()));
        if let Some(timeout) = options.join_timeout {
            recorder = recorder.with_join_timeout(timeout);
        }

        Self {
            recorder,
            clock,
            encoder,
            audio,
            muxer,
            dir,
        }
    }

    fn output(&self) -> PathBuf {
        self.dir.join("clip.mp4")
    }

    fn region() -> CaptureRegion {
        CaptureRegion::new(0, 0, 400, 300)
    }

    fn frames(&self) -> u64 {
        self.recorder.statistics().frames_written
    }

    fn dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

/// Wait for the next progress tick, skipping other events.
fn next_progress(events: &mut broadcast::Receiver<RecorderEvent>) -> (f64, u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match events.try_recv() {
            Ok(RecorderEvent::Progress {
                duration,
                frames_written,
            }) => return (duration, frames_written),
            Ok(_) => {}
            Err(_) => {
                assert!(Instant::now() < deadline, "timed out waiting for progress");
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

/// Number of progress ticks already queued.
fn pending_progress(events: &mut broadcast::Receiver<RecorderEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RecorderEvent::Progress { .. }) {
            count += 1;
        }
    }
    count
}

// --- Tests ---

#[test]
fn region_recording_writes_constant_frame_rate_output() {
    let h = Harness::new("cfr", Options::default());

    assert!(h.recorder.start(Harness::region(), h.output()));
    assert_eq!(h.recorder.state(), RecordingState::Recording);

    h.clock.advance(Duration::from_secs(2));
    wait_until("60 frames", || h.frames() == 60);

    // The loop never runs ahead of the schedule
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.frames(), 60);

    assert!(h.recorder.stop());
    assert_eq!(h.recorder.state(), RecordingState::Idle);

    let stats = h.recorder.statistics();
    assert_eq!(stats.frames_written, 60);
    assert_eq!(stats.frame_write_failures, 0);
    assert_eq!((stats.width, stats.height, stats.fps), (400, 300, 30));

    assert_eq!(h.encoder.frames.load(Ordering::SeqCst), 60);
    assert_eq!(h.encoder.rejected.load(Ordering::SeqCst), 0);
    assert!(h.encoder.stopped.load(Ordering::SeqCst));

    assert!(h.output().is_file());
    assert_eq!(h.dir_entries(), vec!["clip.mp4".to_string()]);

    let summary = h.recorder.last_output().unwrap();
    assert_eq!(summary.output, h.output());
    assert_eq!(summary.outcome, FinalizeOutcome::VideoOnly);
    assert_eq!(summary.frames_written, 60);
    assert_eq!(summary.duration, 2.0);
    assert_eq!(h.muxer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.audio.starts.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_microphone_degrades_to_system_audio() {
    let h = Harness::new(
        "mic",
        Options {
            system_audio: true,
            microphone: true,
            microphone_fails: true,
            ..Options::default()
        },
    );

    assert!(h.recorder.start(Harness::region(), h.output()));
    assert_eq!(
        h.recorder.audio_channels(),
        ActiveChannels {
            system: true,
            microphone: false
        }
    );

    h.clock.advance(Duration::from_secs(1));
    wait_until("30 frames", || h.frames() == 30);
    wait_until("audio", || h.recorder.statistics().audio_chunks_written >= 1);

    let stats = h.recorder.statistics();
    assert!(stats.system_level > 0.0);
    assert_eq!(stats.microphone_level, 0.0);

    assert!(h.recorder.stop());
    assert_eq!(h.audio.stops.load(Ordering::SeqCst), 1);

    let summary = h.recorder.last_output().unwrap();
    assert!(summary.audio_chunks_written >= 1);
    assert_eq!(summary.outcome, FinalizeOutcome::Merged);
    assert!(summary.has_audio());
    assert!(fs::read(h.output()).unwrap().ends_with(b"+AUDIO"));
    assert_eq!(h.dir_entries(), vec!["clip.mp4".to_string()]);
}

#[test]
fn merge_failure_keeps_video_only() {
    let h = Harness::new(
        "fallback",
        Options {
            system_audio: true,
            merge_succeeds: false,
            ..Options::default()
        },
    );

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_secs(1));
    wait_until("30 frames", || h.frames() == 30);
    wait_until("audio", || h.recorder.statistics().audio_chunks_written >= 1);

    assert!(h.recorder.stop());
    assert_eq!(h.muxer.calls.load(Ordering::SeqCst), 1);

    let video = h.encoder.snapshot.lock().unwrap().clone().unwrap();
    assert_eq!(fs::read(h.output()).unwrap(), video);
    assert_eq!(
        h.recorder.last_output().unwrap().outcome,
        FinalizeOutcome::MergeFailed
    );
    assert_eq!(h.dir_entries(), vec!["clip.mp4".to_string()]);
}

#[test]
fn operations_from_invalid_states_fail_without_side_effects() {
    let h = Harness::new("states", Options::default());

    assert!(!h.recorder.pause());
    assert!(!h.recorder.resume());
    assert!(!h.recorder.stop());
    assert_eq!(h.recorder.state(), RecordingState::Idle);

    assert!(h.recorder.start(Harness::region(), h.output()));
    assert!(!h.recorder.start(Harness::region(), h.output()));
    assert!(h.recorder.last_error().is_some());
    assert!(!h.recorder.resume());
    assert_eq!(h.recorder.state(), RecordingState::Recording);

    assert!(h.recorder.pause());
    assert!(!h.recorder.pause());
    assert_eq!(h.recorder.state(), RecordingState::Paused);

    assert!(h.recorder.stop());
    assert!(!h.recorder.stop());
    assert_eq!(h.recorder.state(), RecordingState::Idle);
    assert_eq!(h.recorder.get_duration(), 0.0);
}

#[test]
fn duration_freezes_while_paused() {
    let h = Harness::new("pause", Options::default());
    let mut events = h.recorder.subscribe();

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_secs(1));
    wait_until("30 frames", || h.frames() == 30);

    let before = h.recorder.get_duration();
    assert_eq!(before, 1.0);
    assert!(h.recorder.pause());

    h.clock.advance(Duration::from_secs(5));
    assert_eq!(h.recorder.get_duration(), before);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.frames(), 30);

    assert!(h.recorder.resume());
    assert_eq!(h.recorder.get_duration(), before);

    h.clock.advance(Duration::from_secs(1));
    assert_eq!(h.recorder.get_duration(), 2.0);
    wait_until("60 frames", || h.frames() == 60);

    assert!(h.recorder.stop());
    assert_eq!(h.recorder.last_output().unwrap().duration, 2.0);

    let mut states = Vec::new();
    let mut finalized = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            RecorderEvent::StateChanged(state) => states.push(state),
            RecorderEvent::Finalized(result) => {
                assert!(result.is_ok());
                finalized += 1;
            }
            RecorderEvent::Progress { .. } => {}
        }
    }
    assert_eq!(
        states,
        vec![
            RecordingState::Recording,
            RecordingState::Paused,
            RecordingState::Recording,
            RecordingState::Idle,
        ]
    );
    assert_eq!(finalized, 1);
}

#[test]
fn failed_captures_are_filled_with_black_frames() {
    let h = Harness::new(
        "black",
        Options {
            capture_fails: true,
            ..Options::default()
        },
    );

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_millis(500));
    wait_until("15 frames", || h.frames() == 15);
    assert!(h.recorder.stop());

    assert_eq!(h.encoder.frames.load(Ordering::SeqCst), 15);
    assert_eq!(h.encoder.rejected.load(Ordering::SeqCst), 0);
    let video = fs::read(h.output()).unwrap();
    assert!(video[b"HEADER".len()..].iter().all(|&b| b == 0));
}

#[test]
fn pipe_failures_are_counted_but_do_not_stop_recording() {
    let h = Harness::new(
        "pipe",
        Options {
            fail_writes_after: Some(10),
            ..Options::default()
        },
    );

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_secs(1));
    wait_until("30 frames", || h.frames() == 30);

    let stats = h.recorder.statistics();
    assert_eq!(stats.frame_write_failures, 20);
    assert_eq!(stats.state, RecordingState::Recording);

    assert!(h.recorder.stop());
    assert_eq!(h.encoder.frames.load(Ordering::SeqCst), 10);
}

#[test]
fn encoder_start_failure_rolls_back_to_idle() {
    let h = Harness::new(
        "rollback",
        Options {
            system_audio: true,
            encoder_start_fails: true,
            ..Options::default()
        },
    );

    assert!(!h.recorder.start(Harness::region(), h.output()));
    assert_eq!(h.recorder.state(), RecordingState::Idle);
    assert!(h.recorder.last_error().unwrap().contains("FFmpeg"));
    assert_eq!(h.audio.starts.load(Ordering::SeqCst), 0);
    assert!(h.dir_entries().is_empty());
    assert!(!h.recorder.stop());
}

#[test]
fn odd_regions_are_rounded_to_even() {
    let h = Harness::new("odd", Options::default());

    assert!(h.recorder.start(CaptureRegion::new(5, 5, 401, 301), h.output()));
    let stats = h.recorder.statistics();
    assert_eq!((stats.width, stats.height), (400, 300));

    h.clock.advance(Duration::from_millis(100));
    wait_until("3 frames", || h.frames() == 3);
    assert!(h.recorder.stop());
    assert_eq!(h.encoder.rejected.load(Ordering::SeqCst), 0);
}

#[test]
fn sessions_can_be_repeated() {
    let h = Harness::new("repeat", Options::default());

    for round in 0..2 {
        assert!(h.recorder.start(Harness::region(), h.output()), "round {}", round);
        h.clock.advance(Duration::from_millis(200));
        wait_until("6 frames", || h.frames() == 6);
        assert!(h.recorder.stop());
        assert_eq!(h.recorder.statistics().frames_written, 6);
    }
    assert_eq!(h.dir_entries(), vec!["clip.mp4".to_string()]);
}

#[test]
fn progress_ticks_follow_recorded_time() {
    let h = Harness::new("progress", Options::default());
    let mut events = h.recorder.subscribe();

    assert!(h.recorder.start(Harness::region(), h.output()));
    let (duration, frames) = next_progress(&mut events);
    assert_eq!(duration, 0.0);
    assert_eq!(frames, 0);
    assert_eq!(duration, h.recorder.get_duration());

    // Less than the tick interval since the last one
    h.clock.advance(Duration::from_millis(100));
    wait_until("3 frames", || h.frames() == 3);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(pending_progress(&mut events), 0);

    h.clock.advance(Duration::from_millis(150));
    let (duration, frames) = next_progress(&mut events);
    assert_eq!(duration, 0.25);
    assert_eq!(duration, h.recorder.get_duration());
    assert!(frames <= 7);

    assert!(h.recorder.pause());
    thread::sleep(Duration::from_millis(50));
    pending_progress(&mut events);
    h.clock.advance(Duration::from_secs(1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(pending_progress(&mut events), 0);

    assert!(h.recorder.resume());
    h.clock.advance(Duration::from_millis(250));
    let (duration, _) = next_progress(&mut events);
    assert_eq!(duration, 0.5);

    assert!(h.recorder.stop());
}

#[test]
fn audio_captured_while_paused_is_discarded() {
    let h = Harness::new(
        "pause-audio",
        Options {
            system_audio: true,
            ..Options::default()
        },
    );

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_secs(1));
    wait_until("30 frames", || h.frames() == 30);
    wait_until("audio", || h.recorder.statistics().audio_chunks_written >= 1);
    wait_until("queue drained", || h.audio.queued() == 0);
    let written = h.recorder.statistics().audio_chunks_written;

    assert!(h.recorder.pause());
    h.audio.push_system(4);
    wait_until("paused audio discarded", || h.audio.queued() == 0);

    assert!(h.recorder.resume());
    h.clock.advance(Duration::from_secs(1));
    wait_until("60 frames", || h.frames() == 60);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.recorder.statistics().audio_chunks_written, written);

    assert!(h.recorder.stop());
}

#[test]
fn stuck_capture_defers_finalization_until_the_loop_exits() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let h = Harness::new(
        "stuck",
        Options {
            capture_gate: Some((entered_tx, release_rx)),
            join_timeout: Some(Duration::from_millis(100)),
            ..Options::default()
        },
    );
    let mut events = h.recorder.subscribe();

    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_secs(1));
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The loop still owns the encoder, so nothing may be moved into place
    assert!(!h.recorder.stop());
    assert_eq!(h.recorder.state(), RecordingState::Idle);
    assert!(h.recorder.is_finalizing());
    assert!(!h.encoder.stopped.load(Ordering::SeqCst));
    assert!(!h.output().exists());

    assert!(!h.recorder.start(Harness::region(), h.output()));
    assert!(h.recorder.last_error().unwrap().contains("finalized"));

    release_tx.send(()).unwrap();
    wait_until("background finalization", || !h.recorder.is_finalizing());

    assert!(h.encoder.stopped.load(Ordering::SeqCst));
    assert_eq!(h.encoder.frames.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read(h.output()).unwrap(), b"HEADER");
    assert_eq!(h.dir_entries(), vec!["clip.mp4".to_string()]);
    let summary = h.recorder.last_output().unwrap();
    assert_eq!(summary.outcome, FinalizeOutcome::VideoOnly);
    assert_eq!(summary.frames_written, 0);

    let mut finalized = 0;
    while let Ok(event) = events.try_recv() {
        if let RecorderEvent::Finalized(result) = event {
            assert!(result.is_ok());
            finalized += 1;
        }
    }
    assert_eq!(finalized, 1);

    // The next session is served by its own loop only
    assert!(h.recorder.start(Harness::region(), h.output()));
    h.clock.advance(Duration::from_millis(200));
    wait_until("6 frames", || h.frames() == 6);
    assert!(h.recorder.stop());
    assert_eq!(h.encoder.frames.load(Ordering::SeqCst), 6);
    assert_eq!(h.recorder.last_output().unwrap().frames_written, 6);
}
