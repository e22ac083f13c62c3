//! Audio capture and mixing.
//!
//! Two independent capture sessions ("system" loopback and "microphone")
//! push fixed-size PCM chunks into one bounded [`ChunkQueue`]. The recording
//! engine drains the queue and folds each burst into a single chunk with
//! [`mixer::mix_chunks`].

pub mod cpal_source;
pub mod mixer;
pub mod queue;
pub mod source;

use reelcap_common::AudioSourceLabel;
use std::time::Instant;

pub use cpal_source::CpalAudioSource;
pub use mixer::{drain_and_mix, mix_chunks, AudioLevels, MixedChunk};
pub use queue::ChunkQueue;
pub use source::{list_audio_devices, ActiveChannels, AudioSource};

/// Sample rate of every chunk, in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Interleaved channels per chunk.
pub const CHANNELS: u16 = 2;

/// Frames (samples per channel) per chunk, ~100 ms.
pub const CHUNK_FRAMES: usize = 4_800;

/// Interleaved `i16` values per full chunk.
pub const CHUNK_SAMPLES: usize = CHUNK_FRAMES * CHANNELS as usize;

/// Bounded queue capacity; the oldest chunk is dropped on overflow.
pub const QUEUE_CAPACITY: usize = 50;

/// Upper bound of chunks folded into one mix.
pub const MAX_CHUNKS_PER_MIX: usize = 5;

/// One block of labeled 16-bit PCM audio, interleaved stereo.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub label: AudioSourceLabel,
    pub captured_at: Instant,
    pub samples: Vec<i16>,
}

impl AudioChunk {
    pub fn new(label: AudioSourceLabel, samples: Vec<i16>) -> Self {
        Self {
            label,
            captured_at: Instant::now(),
            samples,
        }
    }
}

/// Convert a float sample in `[-1, 1]` to `i16`, clamping out-of-range input.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
