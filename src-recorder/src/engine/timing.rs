//! The per-session timing loop.
//!
//! The loop keeps `frames_written` equal to `floor(elapsed * fps)`. When it
//! falls behind it captures once and writes that frame, or the last good one,
//! until the count catches up. Real time is never dropped; frames are
//! duplicated instead.
//!
//! A loop serves exactly one session: it exits as soon as the shared control
//! block no longer carries its generation.

use super::clock::Clock;
use super::state::Shared;
use super::RecorderEvent;
use crate::audio::{drain_and_mix, AudioSource, QUEUE_CAPACITY};
use crate::capture::{Frame, FrameSource};
use crate::encoder::{VideoEncoder, WavWriter};
use reelcap_common::RecordingState;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Longest single wait, so pause and stop are noticed promptly.
pub(crate) const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Minimum spacing of progress events.
pub(crate) const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Resources the loop owns for the whole session and hands back on exit.
pub(crate) struct LoopResources {
    pub source: Box<dyn FrameSource>,
    pub encoder: Box<dyn VideoEncoder>,
    pub wav: Option<WavWriter>,
}

pub(crate) struct TimingLoop {
    pub shared: Arc<Shared>,
    pub clock: Arc<dyn Clock>,
    pub audio: Arc<dyn AudioSource>,
    pub events: broadcast::Sender<RecorderEvent>,
    pub resources: LoopResources,
    pub generation: u64,
}

impl TimingLoop {
    pub fn run(self) -> LoopResources {
        let TimingLoop {
            shared,
            clock,
            audio,
            events,
            mut resources,
            generation,
        } = self;

        let region = resources.source.region();
        let mut last_frame = Frame::black(&region);
        let mut last_progress: Option<Instant> = None;
        let mut audio_failed = false;

        debug!(region = %region, generation, "Timing loop started");

        loop {
            let now = clock.now();
            let (state, expected) = {
                let control = shared.control();
                let elapsed = control.elapsed(now);
                let expected = (elapsed.as_secs_f64() * control.fps as f64).floor() as u64;
                (control.state_for(generation), expected)
            };

            match state {
                RecordingState::Idle => break,
                RecordingState::Paused => {
                    // Audio captured while paused never reaches the file
                    if resources.wav.is_some() {
                        discard_pending_audio(audio.as_ref());
                    }
                    let control = shared.control();
                    if control.state_for(generation) == RecordingState::Paused {
                        drop(shared.wait(control, SLEEP_SLICE));
                    }
                    continue;
                }
                RecordingState::Recording => {}
            }

            // Catch-up burst
            if shared.counters.frames() < expected {
                if let Some(frame) = resources.source.capture() {
                    last_frame = frame;
                }
                while shared.counters.frames() < expected {
                    if shared.state_for(generation) != RecordingState::Recording {
                        break;
                    }
                    if !resources.encoder.write_frame(&last_frame) {
                        let failures = shared
                            .counters
                            .frame_write_failures
                            .fetch_add(1, Ordering::SeqCst)
                            + 1;
                        if failures == 1 || failures % 100 == 0 {
                            warn!(failures, "Frame write failed");
                        }
                    }
                    shared.counters.frames_written.fetch_add(1, Ordering::SeqCst);
                }
            }

            if let Some(wav) = resources.wav.as_mut() {
                let mixed = drain_and_mix(|| audio.read_chunk(Duration::ZERO));
                if let Some((chunk, levels)) = mixed {
                    shared.set_levels(levels);
                    match wav.write_samples(&chunk.samples) {
                        Ok(()) => {
                            shared
                                .counters
                                .audio_chunks_written
                                .fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            if !audio_failed {
                                warn!("Failed to write audio samples: {}", e);
                                audio_failed = true;
                            }
                        }
                    }
                }
            }

            let now = clock.now();
            if last_progress.map_or(true, |t| now.saturating_duration_since(t) >= PROGRESS_INTERVAL) {
                let duration = {
                    let control = shared.control();
                    (control.state_for(generation) == RecordingState::Recording)
                        .then(|| control.elapsed(now).as_secs_f64())
                };
                if let Some(duration) = duration {
                    last_progress = Some(now);
                    let _ = events.send(RecorderEvent::Progress {
                        duration,
                        frames_written: shared.counters.frames(),
                    });
                }
            }

            sleep_until_next_frame(&shared, clock.as_ref(), generation);
        }

        debug!(generation, "Timing loop exited");
        resources
    }
}

/// Drop whatever audio is queued, bounded so a busy producer cannot pin the loop.
fn discard_pending_audio(audio: &dyn AudioSource) {
    let mut discarded = 0;
    while discarded < QUEUE_CAPACITY && audio.read_chunk(Duration::ZERO).is_some() {
        discarded += 1;
    }
    if discarded > 0 {
        trace!(discarded, "Discarded audio captured while paused");
    }
}

/// Sleep until the next frame is due, waking early on any state change.
fn sleep_until_next_frame(shared: &Shared, clock: &dyn Clock, generation: u64) {
    let next_index = shared.counters.frames() + 1;
    let mut control = shared.control();

    loop {
        if control.state_for(generation) != RecordingState::Recording {
            return;
        }
        let Some(deadline) = control.frame_deadline(next_index) else {
            return;
        };
        let now = clock.now();
        if now >= deadline {
            return;
        }
        let slice = (deadline - now).min(SLEEP_SLICE);
        trace!(?slice, "Waiting for next frame");
        control = shared.wait(control, slice);
    }
}
