//! Platform-specific logging directory resolution.

use std::path::PathBuf;

/// Base name of the rolling log file.
pub const LOG_FILE_BASENAME: &str = "reelcap.log";

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "REELCAP_LOG_DIR";

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/reelcap/logs` or `~/.local/state/reelcap/logs` |
/// | macOS | `~/Library/Logs/reelcap` |
/// | Windows | `%LOCALAPPDATA%\reelcap\logs` |
///
/// Falls back to the system temp directory when no home directory can be
/// determined.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    let Some(base) = directories::ProjectDirs::from("", "", "reelcap") else {
        return std::env::temp_dir().join("reelcap").join("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().join("state"))
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/reelcap
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        library.join("Logs").join("reelcap")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

/// Ensures the log directory exists, creating it if necessary.
pub fn ensure_log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the base path for the application log file.
///
/// The rolling appender uses this path's parent directory and creates
/// dated files (e.g. `reelcap.log.2026-03-01`).
pub fn app_log_path() -> PathBuf {
    log_dir().join(LOG_FILE_BASENAME)
}
