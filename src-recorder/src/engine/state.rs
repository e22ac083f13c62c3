//! Session state shared between the recorder and its timing loop.

use crate::audio::AudioLevels;
use reelcap_common::{CaptureRegion, RecordingState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Timestamps and state of the current session.
#[derive(Debug, Clone, Default)]
pub(crate) struct Control {
    pub state: RecordingState,
    pub start_time: Option<Instant>,
    pub pause_started_at: Option<Instant>,
    pub accumulated_pause: Duration,
    pub fps: u32,
    pub region: Option<CaptureRegion>,
    /// Bumped by every `begin`; a timing loop only serves its own session
    pub generation: u64,
}

impl Control {
    /// Pause-aware recording time at `now`. Zero when no session is running.
    pub fn elapsed(&self, now: Instant) -> Duration {
        if self.state == RecordingState::Idle {
            return Duration::ZERO;
        }
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };

        let mut elapsed = now
            .saturating_duration_since(start)
            .saturating_sub(self.accumulated_pause);
        if let Some(paused_at) = self.pause_started_at {
            elapsed = elapsed.saturating_sub(now.saturating_duration_since(paused_at));
        }
        elapsed
    }

    /// Wall-clock instant at which `frame_index` is due.
    pub fn frame_deadline(&self, frame_index: u64) -> Option<Instant> {
        let start = self.start_time?;
        if self.fps == 0 {
            return None;
        }
        let offset = Duration::from_secs_f64(frame_index as f64 / self.fps as f64);
        Some(start + self.accumulated_pause + offset)
    }

    /// Start a new session and return its generation.
    pub fn begin(&mut self, now: Instant, fps: u32, region: CaptureRegion) -> u64 {
        *self = Control {
            state: RecordingState::Recording,
            start_time: Some(now),
            pause_started_at: None,
            accumulated_pause: Duration::ZERO,
            fps,
            region: Some(region),
            generation: self.generation.wrapping_add(1),
        };
        self.generation
    }

    /// State as seen by the loop of session `generation`: idle once that
    /// session has ended, even if a newer one is running.
    pub fn state_for(&self, generation: u64) -> RecordingState {
        if self.generation == generation {
            self.state
        } else {
            RecordingState::Idle
        }
    }

    /// Back to idle. The last region and fps stay for statistics.
    pub fn end(&mut self) {
        self.state = RecordingState::Idle;
        self.start_time = None;
        self.pause_started_at = None;
        self.accumulated_pause = Duration::ZERO;
    }
}

/// Counters updated by the timing loop.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_written: AtomicU64,
    pub frame_write_failures: AtomicU64,
    pub audio_chunks_written: AtomicU64,
}

impl Counters {
    pub fn reset(&self) {
        self.frames_written.store(0, Ordering::SeqCst);
        self.frame_write_failures.store(0, Ordering::SeqCst);
        self.audio_chunks_written.store(0, Ordering::SeqCst);
    }

    pub fn frames(&self) -> u64 {
        self.frames_written.load(Ordering::SeqCst)
    }
}

/// Everything the recorder and the timing loop both touch.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    control: Mutex<Control>,
    /// Signalled on every state change so a sleeping loop wakes promptly
    pub wake: Condvar,
    pub counters: Counters,
    levels: Mutex<AudioLevels>,
    /// Set while a session whose loop missed the join timeout is finalized
    pub finalizing: AtomicBool,
}

impl Shared {
    pub fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> RecordingState {
        self.control().state
    }

    pub fn state_for(&self, generation: u64) -> RecordingState {
        self.control().state_for(generation)
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing.load(Ordering::SeqCst)
    }

    /// Wait on the wake condvar for at most `timeout`.
    pub fn wait<'a>(
        &self,
        guard: MutexGuard<'a, Control>,
        timeout: Duration,
    ) -> MutexGuard<'a, Control> {
        match self.wake.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(e) => e.into_inner().0,
        }
    }

    pub fn levels(&self) -> AudioLevels {
        *self.levels.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_levels(&self, levels: AudioLevels) {
        *self.levels.lock().unwrap_or_else(|e| e.into_inner()) = levels;
    }
}
