//! Streaming WAV writer for the session's audio track.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: u64 = 44;

/// Writes 16-bit PCM to a WAV file. The header is written as a placeholder
/// and patched with the real sizes in [`WavWriter::finish`].
pub struct WavWriter {
    file: Option<BufWriter<File>>,
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    bytes_written: u64,
}

impl WavWriter {
    /// Create the file and write the placeholder header.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> std::io::Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&create_wav_header(sample_rate, channels, 0))?;

        debug!("Audio output path: {:?}", path);
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            sample_rate,
            channels,
            bytes_written: 0,
        })
    }

    /// Append interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> std::io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        file.write_all(&pcm)?;
        self.bytes_written += pcm.len() as u64;
        Ok(())
    }

    /// Patch the header with the final sizes and close the file.
    pub fn finish(mut self) -> std::io::Result<PathBuf> {
        if let Some(file) = self.file.take() {
            let mut file = file.into_inner().map_err(|e| e.into_error())?;
            file.seek(SeekFrom::Start(0))?;
            let data_size = u32::try_from(self.bytes_written).unwrap_or(u32::MAX);
            file.write_all(&create_wav_header(self.sample_rate, self.channels, data_size))?;
            file.sync_all()?;
        }

        debug!("Finished WAV, wrote {} bytes of audio data", self.bytes_written);
        Ok(self.path.clone())
    }
}

/// Create a WAV file header for 16-bit PCM.
pub fn create_wav_header(sample_rate: u32, channels: u16, data_size: u32) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;
    let file_size = 36u32.saturating_add(data_size);

    let mut header = Vec::with_capacity(WAV_HEADER_LEN as usize);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&file_size.to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // Chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&16u16.to_le_bytes()); // Bits per sample

    // data chunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    header
}
