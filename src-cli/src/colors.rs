//! Terminal color support for CLI output.
//!
//! Colors are only applied when the target stream is a terminal, so piped
//! output stays plain.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use reelcap_common::RecordingState;

/// Pad a string to a minimum width (left-aligned), then apply a color function.
/// Padding happens first so ANSI escape codes do not count towards the width.
pub fn pad_left<F>(msg: &str, width: usize, color_fn: F) -> String
where
    F: FnOnce(&str) -> String,
{
    let padded = format!("{:<width$}", msg);
    color_fn(&padded)
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal()
}

pub fn is_stderr_interactive() -> bool {
    std::io::stderr().is_terminal()
}

/// Apply `style` only when stdout is a terminal.
fn for_stdout(msg: &str, style: impl FnOnce(&str) -> String) -> String {
    if is_interactive() {
        style(msg)
    } else {
        msg.to_string()
    }
}

/// Apply `style` only when stderr is a terminal.
fn for_stderr(msg: &str, style: impl FnOnce(&str) -> String) -> String {
    if is_stderr_interactive() {
        style(msg)
    } else {
        msg.to_string()
    }
}

pub fn error(msg: &str) -> String {
    format!("{} {}", for_stderr("error:", |s| s.red().bold().to_string()), msg)
}

pub fn warning(msg: &str) -> String {
    format!("{} {}", for_stderr("warning:", |s| s.yellow().bold().to_string()), msg)
}

/// Status lines go to stderr.
pub fn info(msg: &str) -> String {
    for_stderr(msg, |s| s.cyan().to_string())
}

pub fn success(msg: &str) -> String {
    for_stdout(msg, |s| s.green().to_string())
}

pub fn dim(msg: &str) -> String {
    for_stdout(msg, |s| s.dimmed().to_string())
}

pub fn bold(msg: &str) -> String {
    for_stdout(msg, |s| s.bold().to_string())
}

pub fn header(msg: &str) -> String {
    for_stdout(msg, |s| s.bold().blue().to_string())
}

pub fn path(msg: &str) -> String {
    for_stdout(msg, |s| s.underline().to_string())
}

pub fn number(msg: &str) -> String {
    for_stdout(msg, |s| s.cyan().to_string())
}

pub fn yes() -> String {
    for_stdout("yes", |s| s.green().to_string())
}

pub fn no() -> String {
    for_stdout("no", |s| s.dimmed().to_string())
}

/// Elapsed time as `MM:SS` (stderr styling).
pub fn elapsed_time(seconds: f64) -> String {
    for_stderr(&clock_text(seconds), |s| s.yellow().bold().to_string())
}

fn clock_text(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Recording state label (stderr styling).
pub fn state(state: RecordingState) -> String {
    let label = match state {
        RecordingState::Idle => "IDLE",
        RecordingState::Recording => "● REC",
        RecordingState::Paused => "❚❚ PAUSED",
    };
    for_stderr(label, |s| match state {
        RecordingState::Idle => s.dimmed().to_string(),
        RecordingState::Recording => s.red().bold().to_string(),
        RecordingState::Paused => s.yellow().to_string(),
    })
}

/// Fixed-width bar for an RMS level in `0..=1`.
pub fn level_meter(level: f32, width: usize) -> String {
    for_stderr(&meter_bar(level, width), |s| s.green().to_string())
}

fn meter_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}
