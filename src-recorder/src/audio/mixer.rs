//! Chunk-granularity mixing of the system and microphone streams.
//!
//! A burst of dequeued chunks is folded into the first one: each following
//! chunk is averaged in sample by sample up to the shorter length. The
//! accumulator's tail past that length is kept as is, and the longer
//! chunk's tail is discarded.

use super::{AudioChunk, MAX_CHUNKS_PER_MIX};
use reelcap_common::AudioSourceLabel;

/// Result of folding a burst of chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedChunk {
    /// Mixed samples, as long as the first chunk of the burst
    pub samples: Vec<i16>,
    /// Length of the averaged prefix (the shortest chunk length seen)
    pub mixed_len: usize,
    /// Number of chunks folded in
    pub chunk_count: usize,
}

/// Latest RMS level per source, normalized to 0..1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioLevels {
    pub system: f32,
    pub microphone: f32,
}

impl AudioLevels {
    fn record(&mut self, label: AudioSourceLabel, level: f32) {
        let slot = match label {
            AudioSourceLabel::System => &mut self.system,
            AudioSourceLabel::Microphone => &mut self.microphone,
        };
        *slot = slot.max(level);
    }
}

/// Root-mean-square of `samples`, scaled so full scale is 1.0.
pub fn rms_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum / samples.len() as f64).sqrt() / i16::MAX as f64;
    rms.min(1.0) as f32
}

/// Fold `chunks` into one. Returns `None` for an empty burst.
pub fn mix_chunks(chunks: &[AudioChunk]) -> Option<MixedChunk> {
    let (first, rest) = chunks.split_first()?;

    let mut samples = first.samples.clone();
    let mut mixed_len = samples.len();

    for chunk in rest {
        let overlap = samples.len().min(chunk.samples.len());
        for (acc, &other) in samples[..overlap].iter_mut().zip(&chunk.samples[..overlap]) {
            // i32 division truncates toward zero
            *acc = ((*acc as i32 + other as i32) / 2) as i16;
        }
        mixed_len = mixed_len.min(overlap);
    }

    Some(MixedChunk {
        samples,
        mixed_len,
        chunk_count: chunks.len(),
    })
}

/// Per-source levels of a burst; each source reports its loudest chunk.
pub fn burst_levels(chunks: &[AudioChunk]) -> AudioLevels {
    let mut levels = AudioLevels::default();
    for chunk in chunks {
        levels.record(chunk.label, rms_level(&chunk.samples));
    }
    levels
}

/// Pull up to [`MAX_CHUNKS_PER_MIX`] chunks from `next` and mix them.
///
/// `next` must not block. Also returns the per-source levels of the
/// consumed chunks.
pub fn drain_and_mix<F>(mut next: F) -> Option<(MixedChunk, AudioLevels)>
where
    F: FnMut() -> Option<AudioChunk>,
{
    let mut burst = Vec::with_capacity(MAX_CHUNKS_PER_MIX);
    while burst.len() < MAX_CHUNKS_PER_MIX {
        match next() {
            Some(chunk) => burst.push(chunk),
            None => break,
        }
    }
    let levels = burst_levels(&burst);
    mix_chunks(&burst).map(|mixed| (mixed, levels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioChunk, ChunkQueue};

    fn chunk(label: AudioSourceLabel, samples: Vec<i16>) -> AudioChunk {
        AudioChunk::new(label, samples)
    }

    #[test]
    fn empty_burst_yields_nothing() {
        assert!(mix_chunks(&[]).is_none());
    }

    #[test]
    fn single_chunk_passes_through() {
        let a = chunk(AudioSourceLabel::System, vec![1, -2, 3]);
        let mixed = mix_chunks(&[a]).unwrap();
        assert_eq!(mixed.samples, vec![1, -2, 3]);
        assert_eq!(mixed.mixed_len, 3);
        assert_eq!(mixed.chunk_count, 1);
    }

    #[test]
    fn averages_overlap_and_keeps_tail() {
        let a: Vec<i16> = (0..500).map(|i| (i as i16) * 3 - 700).collect();
        let b: Vec<i16> = (0..300).map(|i| 250 - (i as i16) * 5).collect();
        let mixed = mix_chunks(&[
            chunk(AudioSourceLabel::System, a.clone()),
            chunk(AudioSourceLabel::Microphone, b.clone()),
        ])
        .unwrap();

        assert_eq!(mixed.mixed_len, 300);
        assert_eq!(mixed.samples.len(), 500);
        for i in 0..300 {
            let expected = ((a[i] as i32 + b[i] as i32) / 2) as i16;
            assert_eq!(mixed.samples[i], expected, "sample {}", i);
        }
        assert_eq!(&mixed.samples[300..], &a[300..]);
    }

    #[test]
    fn averaging_truncates_toward_zero() {
        let mixed = mix_chunks(&[
            chunk(AudioSourceLabel::System, vec![-3, 3, i16::MIN, i16::MAX]),
            chunk(AudioSourceLabel::Microphone, vec![0, 0, i16::MIN, i16::MAX]),
        ])
        .unwrap();
        assert_eq!(mixed.samples, vec![-1, 1, i16::MIN, i16::MAX]);
    }

    #[test]
    fn longer_second_chunk_is_truncated() {
        let mixed = mix_chunks(&[
            chunk(AudioSourceLabel::System, vec![10, 10]),
            chunk(AudioSourceLabel::Microphone, vec![20, 20, 20, 20]),
        ])
        .unwrap();
        assert_eq!(mixed.samples, vec![15, 15]);
        assert_eq!(mixed.mixed_len, 2);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let level = rms_level(&[i16::MAX, -i16::MAX, i16::MAX, -i16::MAX]);
        assert!((level - 1.0).abs() < 1e-6);
        assert_eq!(rms_level(&[]), 0.0);
        assert_eq!(rms_level(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn levels_are_tracked_per_source() {
        let levels = burst_levels(&[
            chunk(AudioSourceLabel::System, vec![i16::MAX; 8]),
            chunk(AudioSourceLabel::Microphone, vec![0; 8]),
        ]);
        assert!(levels.system > 0.99);
        assert_eq!(levels.microphone, 0.0);
    }

    #[test]
    fn drain_caps_burst_size() {
        let queue = ChunkQueue::new(10);
        for _ in 0..8 {
            queue.push(chunk(AudioSourceLabel::System, vec![1; 4]));
        }
        let (mixed, _) = drain_and_mix(|| queue.try_pop()).unwrap();
        assert_eq!(mixed.chunk_count, MAX_CHUNKS_PER_MIX);
        assert_eq!(queue.len(), 8 - MAX_CHUNKS_PER_MIX);
    }

    #[test]
    fn drain_of_empty_queue_is_none() {
        let queue = ChunkQueue::new(4);
        assert!(drain_and_mix(|| queue.try_pop()).is_none());
    }
}
