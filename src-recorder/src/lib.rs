//! reelcap: constant-frame-rate screen recording.
//!
//! A [`engine::Recorder`] pulls frames from a [`capture::FrameSource`] on a
//! dedicated timing loop, pipes them into FFmpeg, records mixed system and
//! microphone audio to a WAV file, and muxes both into one MP4 on stop.

pub mod audio;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod logging;

pub use engine::{Recorder, RecorderEvent, RecorderSettings, SessionSummary};
pub use error::RecorderError;
pub use reelcap_common as common;
