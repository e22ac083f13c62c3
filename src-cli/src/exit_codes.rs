//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments or capture target
    InvalidArguments = 2,
    /// Recording failed to start
    RecordingFailedToStart = 3,
    /// Recording stopped but no output file could be produced
    RecordingFailedToFinalize = 4,
    /// FFmpeg could not be located or does not run
    EncoderUnavailable = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::RecordingFailedToStart => write!(f, "recording failed to start"),
            ExitCode::RecordingFailedToFinalize => write!(f, "recording failed to finalize"),
            ExitCode::EncoderUnavailable => write!(f, "encoder unavailable"),
        }
    }
}
