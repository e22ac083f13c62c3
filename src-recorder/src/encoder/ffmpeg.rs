//! FFmpeg-backed [`VideoEncoder`] and [`Muxer`].

use super::{merge_args, new_ffmpeg_command, video_encode_args, EncoderSettings, Muxer, VideoEncoder};
use crate::capture::Frame;
use crate::error::EncoderError;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Primary wait for FFmpeg to write trailing container metadata.
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Second wait before the process is killed.
const FINALIZE_GRACE: Duration = Duration::from_secs(5);

const WAIT_POLL: Duration = Duration::from_millis(50);

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// Pipes raw RGB24 frames into an FFmpeg child process.
pub struct FfmpegEncoder {
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    stderr_reader: Option<JoinHandle<()>>,
    stderr_tail: StderrTail,
    output_path: Option<PathBuf>,
    frame_len: usize,
    width: u32,
    height: u32,
    pipe_broken: bool,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            stdin: None,
            child: None,
            stderr_reader: None,
            stderr_tail: Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES))),
            output_path: None,
            frame_len: 0,
            width: 0,
            height: 0,
            pipe_broken: false,
        }
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Last lines FFmpeg wrote to stderr, oldest first.
    fn stderr_report(&self) -> String {
        let tail = self.stderr_tail.lock().unwrap_or_else(|e| e.into_inner());
        tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    fn spawn_stderr_reader(&mut self, child: &mut Child) {
        let Some(stderr) = child.stderr.take() else {
            return;
        };
        let tail = Arc::clone(&self.stderr_tail);

        // Drains stderr so a full pipe buffer never blocks FFmpeg
        let handle = thread::Builder::new()
            .name("reelcap-ffmpeg-stderr".to_string())
            .spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    debug!(target: "ffmpeg", "{}", line);
                    let mut tail = tail.lock().unwrap_or_else(|e| e.into_inner());
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            });

        match handle {
            Ok(handle) => self.stderr_reader = Some(handle),
            Err(e) => warn!("Failed to spawn FFmpeg stderr reader: {}", e),
        }
    }

    fn last_stderr_line(&self) -> String {
        self.stderr_tail
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .back()
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn start(&mut self, settings: &EncoderSettings, output: &Path) -> Result<(), EncoderError> {
        if self.is_running() {
            return Err(EncoderError::AlreadyRunning);
        }
        settings.validate()?;

        let mut command = new_ffmpeg_command()?;
        command.args(video_encode_args(settings, output));

        let inner_command = command.as_inner_mut();
        inner_command.stdin(Stdio::piped());
        inner_command.stdout(Stdio::null());
        inner_command.stderr(Stdio::piped());

        let mut child = inner_command.spawn().map_err(EncoderError::SpawnFailed)?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncoderError::NoStdin);
        };

        self.stderr_tail
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.spawn_stderr_reader(&mut child);

        self.stdin = Some(stdin);
        self.child = Some(child);
        self.output_path = Some(output.to_path_buf());
        self.frame_len = settings.frame_len();
        self.width = settings.width;
        self.height = settings.height;
        self.pipe_broken = false;

        info!(
            "FFmpeg started: {}x{} @ {} fps, {} -> {:?}",
            settings.width, settings.height, settings.fps, settings.bitrate, output
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> bool {
        if frame.data().len() != self.frame_len
            || frame.width() != self.width
            || frame.height() != self.height
        {
            warn!(
                "Rejecting frame: {}x{} ({} bytes), encoder expects {}x{} ({} bytes)",
                frame.width(),
                frame.height(),
                frame.data().len(),
                self.width,
                self.height,
                self.frame_len
            );
            return false;
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return false;
        };

        match stdin.write_all(frame.data()) {
            Ok(()) => true,
            Err(e) => {
                if !self.pipe_broken {
                    if e.kind() == ErrorKind::BrokenPipe {
                        warn!("FFmpeg closed its input pipe: {}", self.last_stderr_line());
                    } else {
                        warn!("Failed to write frame to FFmpeg: {}", e);
                    }
                }
                self.pipe_broken = true;
                false
            }
        }
    }

    fn stop(&mut self) -> bool {
        // Close stdin to signal end of input
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }

        let Some(mut child) = self.child.take() else {
            return false;
        };

        let status = match wait_with_timeout(&mut child, FINALIZE_TIMEOUT) {
            Some(status) => Some(status),
            None => {
                warn!(
                    "FFmpeg still finalizing after {:?}, waiting {:?} more",
                    FINALIZE_TIMEOUT, FINALIZE_GRACE
                );
                match wait_with_timeout(&mut child, FINALIZE_GRACE) {
                    Some(status) => Some(status),
                    None => {
                        error!("Force terminating FFmpeg");
                        let _ = child.kill();
                        child.wait().ok()
                    }
                }
            }
        };

        if let Some(reader) = self.stderr_reader.take() {
            let _ = reader.join();
        }

        match status {
            Some(status) if status.success() => {
                info!("FFmpeg finished: {:?}", self.output_path);
                true
            }
            Some(status) => {
                let err = EncoderError::Failed {
                    code: status.code(),
                    message: self.stderr_report(),
                };
                error!("{}", err);
                false
            }
            None => {
                error!("FFmpeg exit status unavailable");
                false
            }
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll `child` until it exits or `timeout` elapses.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll FFmpeg: {}", e);
                return None;
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(WAIT_POLL);
    }
}

/// Runs FFmpeg a second time to mux the session's video and audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMuxer;

impl Muxer for FfmpegMuxer {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> bool {
        info!("Muxing video {:?} with audio {:?}", video, audio);

        let mut command = match new_ffmpeg_command() {
            Ok(command) => command,
            Err(e) => {
                warn!("Cannot mux: {}", e);
                return false;
            }
        };
        command.args(merge_args(video, audio, output));

        let inner_command = command.as_inner_mut();
        inner_command.stdin(Stdio::null());
        inner_command.stdout(Stdio::null());
        inner_command.stderr(Stdio::piped());

        let result = match inner_command.output() {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to run FFmpeg for muxing: {}", e);
                return false;
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!(
                "Muxing failed with {:?}: {}",
                result.status.code(),
                stderr.lines().last().unwrap_or("")
            );
            return false;
        }

        if !output.is_file() {
            warn!("Muxing reported success but {:?} is missing", output);
            return false;
        }

        info!("Muxing complete: {:?}", output);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcap_common::CaptureRegion;

    #[test]
    fn write_before_start_fails() {
        let mut encoder = FfmpegEncoder::new();
        let frame = Frame::black(&CaptureRegion::new(0, 0, 2, 2));
        assert!(!encoder.write_frame(&frame));
        assert!(!encoder.stop());
        assert!(!encoder.is_running());
    }

    #[test]
    fn invalid_settings_are_rejected_before_spawning() {
        let mut encoder = FfmpegEncoder::new();
        let settings = EncoderSettings {
            width: 3,
            height: 2,
            fps: 30,
            bitrate: "1M".to_string(),
            output_size: None,
        };
        let result = encoder.start(&settings, Path::new("never.mp4"));
        assert!(matches!(result, Err(EncoderError::InvalidSettings(_))));
        assert!(!encoder.is_running());
    }

    #[test]
    fn stderr_report_keeps_the_last_lines() {
        let encoder = FfmpegEncoder::new();
        {
            let mut tail = encoder.stderr_tail.lock().unwrap();
            for i in 0..STDERR_TAIL_LINES + 2 {
                tail.push_back(format!("line {}", i));
                if tail.len() > STDERR_TAIL_LINES {
                    tail.pop_front();
                }
            }
        }
        let report = encoder.stderr_report();
        assert_eq!(report.lines().count(), STDERR_TAIL_LINES);
        assert!(report.starts_with("line 2\n"));
        assert!(report.ends_with(&format!("line {}", STDERR_TAIL_LINES + 1)));
    }
}
