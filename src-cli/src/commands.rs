//! CLI command implementations.

use crate::colors;
use crate::exit_codes::ExitCode;
use crate::{RecordOptions, RecordTarget};
use anyhow::Context;
use reelcap_common::{AudioDeviceKind, RecordingState, Resolution, VideoQuality};
use reelcap_lib::audio::list_audio_devices;
use reelcap_lib::capture::{self, resolve_region, ScreenDisplays};
use reelcap_lib::config::{self, AppConfig};
use reelcap_lib::encoder::{ensure_ffmpeg, resolve_ffmpeg_path, FFMPEG_ENV};
use reelcap_lib::{Recorder, RecorderEvent};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

/// How often the record loop checks for input and redraws progress.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest wait for a session whose capture was stuck when stopped.
const FINALIZE_WAIT: Duration = Duration::from_secs(60);

/// Width of the audio level bars in the progress line.
const METER_WIDTH: usize = 8;

/// List available displays.
pub fn list_displays(json: bool, quiet: bool) -> anyhow::Result<ExitCode> {
    let monitors = capture::list_monitors();

    if json {
        println!("{}", serde_json::to_string_pretty(&monitors)?);
    } else if monitors.is_empty() {
        if !quiet {
            println!("{}", colors::dim("No displays found."));
        }
    } else {
        let name_width = monitors
            .iter()
            .map(|m| m.name.len())
            .max()
            .unwrap_or(4)
            .max(4);

        println!(
            "{}  {}  {}  {}  {}",
            colors::pad_left("ID", 4, colors::header),
            colors::pad_left("NAME", name_width, colors::header),
            colors::pad_left("RESOLUTION", 14, colors::header),
            colors::pad_left("POSITION", 12, colors::header),
            colors::header("PRIMARY")
        );
        println!(
            "{}  {}  {}  {}  {}",
            "-".repeat(4),
            "-".repeat(name_width),
            "-".repeat(14),
            "-".repeat(12),
            "-".repeat(7)
        );

        for monitor in monitors {
            let resolution = format!("{}x{}", monitor.width, monitor.height);
            let position = format!("{},{}", monitor.x, monitor.y);
            let primary = if monitor.is_primary {
                colors::yes()
            } else {
                colors::no()
            };
            println!(
                "{}  {:<name_width$}  {:<14}  {:<12}  {}",
                colors::pad_left(&monitor.id.to_string(), 4, colors::number),
                monitor.name,
                resolution,
                position,
                primary
            );
        }
    }
    Ok(ExitCode::Success)
}

/// List capturable windows.
pub fn list_windows(json: bool, quiet: bool) -> anyhow::Result<ExitCode> {
    let windows = capture::list_windows();

    if json {
        println!("{}", serde_json::to_string_pretty(&windows)?);
    } else if windows.is_empty() {
        if !quiet {
            println!("{}", colors::dim("No capturable windows found."));
        }
    } else {
        let id_width = windows
            .iter()
            .map(|w| w.id.to_string().len())
            .max()
            .unwrap_or(2)
            .max(2);
        let app_width = windows
            .iter()
            .map(|w| w.app_name.len())
            .max()
            .unwrap_or(3)
            .clamp(3, 24);

        println!(
            "{}  {}  {}  {}",
            colors::pad_left("ID", id_width, colors::header),
            colors::pad_left("APP", app_width, colors::header),
            colors::pad_left("SIZE", 11, colors::header),
            colors::header("TITLE")
        );
        println!(
            "{}  {}  {}  -----",
            "-".repeat(id_width),
            "-".repeat(app_width),
            "-".repeat(11)
        );

        for window in windows {
            let size = format!("{}x{}", window.width, window.height);
            println!(
                "{}  {:<app_width$}  {:<11}  {}",
                colors::pad_left(&window.id.to_string(), id_width, colors::number),
                truncate(&window.app_name, app_width),
                size,
                truncate(&window.title, 60)
            );
        }
    }
    Ok(ExitCode::Success)
}

/// List audio devices, grouped by the option that selects them.
pub fn list_audio(json: bool, quiet: bool) -> anyhow::Result<ExitCode> {
    let devices = list_audio_devices();

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(ExitCode::Success);
    }
    if devices.is_empty() {
        if !quiet {
            println!("{}", colors::dim("No audio devices found."));
        }
        return Ok(ExitCode::Success);
    }

    let groups = [
        (AudioDeviceKind::Output, "System Audio (--system-device):"),
        (AudioDeviceKind::Input, "Microphones (--mic-device):"),
    ];
    for (kind, title) in groups {
        let group: Vec<_> = devices.iter().filter(|d| d.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        println!("{}", colors::bold(title));
        for device in group {
            let marker = if device.is_default {
                colors::dim(" (default)")
            } else {
                String::new()
            };
            println!("  {}{}", device.name, marker);
        }
        println!();
    }
    Ok(ExitCode::Success)
}

/// Keyboard and signal commands for a running recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
}

impl Control {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "p" | "pause" => Some(Control::Pause),
            "r" | "resume" => Some(Control::Resume),
            "s" | "stop" | "q" | "quit" => Some(Control::Stop),
            _ => None,
        }
    }
}

/// Result line printed when a recording finishes.
#[derive(Debug, Serialize)]
struct RecordingReport {
    status: &'static str,
    file_path: PathBuf,
    has_audio: bool,
    duration_seconds: f64,
    frames_written: u64,
    frame_write_failures: u64,
}

/// Record a target until stopped.
pub fn record(target: &RecordTarget, json: bool, quiet: bool) -> anyhow::Result<ExitCode> {
    let options = target.options();
    let mut app_config = config::load_config();
    if let Err(msg) = apply_overrides(&mut app_config, options) {
        if !quiet {
            eprintln!("{}", colors::error(&msg));
        }
        return Ok(ExitCode::InvalidArguments);
    }

    match ensure_ffmpeg() {
        Ok(path) => debug!("Using FFmpeg at {:?}", path),
        Err(e) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
                eprintln!(
                    "Install FFmpeg on your PATH or point {} at the binary.",
                    FFMPEG_ENV
                );
            }
            return Ok(ExitCode::EncoderUnavailable);
        }
    }

    let region = match resolve_region(&target.capture_target(), &ScreenDisplays) {
        Ok(region) => region,
        Err(e) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
                eprintln!("Use 'reelcap list displays' or 'reelcap list windows' to see targets.");
            }
            return Ok(ExitCode::InvalidArguments);
        }
    };

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| config::default_output_path(&app_config));

    let (tx, rx) = mpsc::channel();
    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(Control::Stop);
    })
    .context("Failed to install Ctrl+C handler")?;
    spawn_control_reader(tx);

    let countdown = effective_countdown(&app_config, options);
    if countdown > 0 && !run_countdown(countdown, &rx, quiet || json) {
        if !quiet && !json {
            eprintln!("\n{}", colors::info("Cancelled."));
        }
        return Ok(ExitCode::Success);
    }

    let recorder = Recorder::new(app_config.recorder_settings());
    let mut events = recorder.subscribe();

    if !recorder.start(region, &output) {
        if !quiet {
            let reason = recorder
                .last_error()
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!(
                "{}",
                colors::error(&format!("Recording failed to start: {}", reason))
            );
        }
        return Ok(ExitCode::RecordingFailedToStart);
    }

    let channels = recorder.audio_channels();
    if !quiet {
        if app_config.audio.system_enabled && !channels.system {
            eprintln!("{}", colors::warning("System audio unavailable, recording without it."));
        }
        if app_config.audio.microphone_enabled && !channels.microphone {
            eprintln!("{}", colors::warning("Microphone unavailable, recording without it."));
        }
    }

    let show_progress = !quiet && !json && colors::is_stderr_interactive();
    if !quiet && !json {
        eprintln!(
            "{} {} -> {}",
            colors::info("Recording"),
            region,
            colors::path(&output.display().to_string())
        );
        eprintln!(
            "{}",
            colors::dim("Type p + Enter to pause, r to resume, s to stop. Ctrl+C also stops.")
        );
    }

    let duration_limit = options.duration.map(|secs| secs as f64);
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Control::Pause) => {
                recorder.pause();
            }
            Ok(Control::Resume) => {
                recorder.resume();
            }
            Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        drain_events(&mut events);

        if let Some(limit) = duration_limit {
            if recorder.get_duration() >= limit {
                info!("Duration limit of {}s reached", limit);
                break;
            }
        }

        if show_progress {
            render_progress(&recorder);
        }
    }

    if !quiet && !json {
        eprintln!("\n{}", colors::info("Finalizing..."));
    }

    let mut stopped = recorder.stop();
    if !stopped && recorder.is_finalizing() {
        if !quiet && !json {
            eprintln!(
                "{}",
                colors::warning("Capture is slow to stop; waiting for the file to be finalized.")
            );
        }
        stopped = wait_for_finalize(&recorder);
    }
    drain_events(&mut events);

    match recorder.last_output().filter(|_| stopped) {
        Some(summary) => {
            if !summary.encoder_ok && !quiet {
                eprintln!(
                    "{}",
                    colors::warning("The encoder reported an error; the file may be incomplete.")
                );
            }
            if json {
                let report = RecordingReport {
                    status: "recording_saved",
                    file_path: summary.output.clone(),
                    has_audio: summary.has_audio(),
                    duration_seconds: summary.duration,
                    frames_written: summary.frames_written,
                    frame_write_failures: summary.frame_write_failures,
                };
                println!("{}", serde_json::to_string(&report)?);
            } else if !quiet {
                let audio = if summary.has_audio() {
                    colors::yes()
                } else {
                    colors::no()
                };
                println!(
                    "{} {}",
                    colors::success("Recording saved:"),
                    colors::path(&summary.output.display().to_string())
                );
                println!(
                    "  {:.1}s, {} frames, audio: {}",
                    summary.duration, summary.frames_written, audio
                );
            }
            Ok(ExitCode::Success)
        }
        None => {
            if !quiet {
                let reason = recorder
                    .last_error()
                    .unwrap_or_else(|| "no output produced".to_string());
                eprintln!(
                    "{}",
                    colors::error(&format!("Recording failed to finalize: {}", reason))
                );
            }
            Ok(ExitCode::RecordingFailedToFinalize)
        }
    }
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut AppConfig, options: &RecordOptions) -> Result<(), String> {
    let recording = &mut config.recording;

    if let Some(fps) = options.fps {
        if fps == 0 || fps > 240 {
            return Err(format!("Invalid frame rate {}. Use 1-240.", fps));
        }
        recording.fps = fps;
    }

    if let Some(quality) = &options.quality {
        match VideoQuality::parse(quality) {
            Some(VideoQuality::Custom) | None => {
                return Err(format!(
                    "Invalid quality '{}'. Valid presets: low, medium, high",
                    quality
                ));
            }
            Some(preset) => recording.quality = preset,
        }
    }

    if let Some(bitrate) = &options.bitrate {
        let valid = bitrate
            .trim()
            .trim_end_matches(['k', 'K', 'm', 'M'])
            .parse::<u32>()
            .is_ok_and(|n| n > 0);
        if !valid {
            return Err(format!("Invalid bitrate '{}'. Example: 6M or 2500k", bitrate));
        }
        recording.quality = VideoQuality::Custom;
        recording.bitrate = bitrate.trim().to_string();
    }

    if let Some(resolution) = &options.resolution {
        recording.resolution = Resolution::parse(resolution).ok_or_else(|| {
            format!(
                "Invalid resolution '{}'. Valid values: native, 720p, 1080p, 1440p, 4k",
                resolution
            )
        })?;
    }

    let audio = &mut config.audio;
    if options.no_system_audio {
        audio.system_enabled = false;
    }
    if options.no_mic {
        audio.microphone_enabled = false;
    }
    if let Some(device) = &options.system_device {
        audio.system_device = Some(device.clone());
    }
    if let Some(device) = &options.mic_device {
        audio.microphone_device = Some(device.clone());
    }

    Ok(())
}

/// Countdown length in seconds: the flag wins over the config.
fn effective_countdown(config: &AppConfig, options: &RecordOptions) -> u32 {
    match options.countdown {
        Some(secs) => secs,
        None if config.recording.countdown_enabled => config.recording.countdown_seconds,
        None => 0,
    }
}

/// Count down on stderr. Returns `false` if a stop arrived first.
fn run_countdown(seconds: u32, rx: &mpsc::Receiver<Control>, silent: bool) -> bool {
    for remaining in (1..=seconds).rev() {
        if !silent {
            eprint!("\r{} {}...", colors::info("Starting in"), remaining);
            let _ = std::io::stderr().flush();
        }
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(Control::Stop) => return false,
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
    if !silent {
        eprintln!("\r{}", " ".repeat(24));
    }
    true
}

/// Forward stdin lines as controls until stdin closes.
fn spawn_control_reader(tx: Sender<Control>) {
    let spawned = thread::Builder::new()
        .name("reelcap-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match Control::parse(&line) {
                    Some(control) => {
                        if tx.send(control).is_err() {
                            break;
                        }
                    }
                    None if !line.trim().is_empty() => {
                        debug!("Ignoring unknown control {:?}", line.trim());
                    }
                    None => {}
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Keyboard controls unavailable: {}", e);
    }
}

/// Wait for a deferred finalization. This process records a single
/// session, so any summary present afterwards is that session's.
fn wait_for_finalize(recorder: &Recorder) -> bool {
    let mut waited = Duration::ZERO;
    while recorder.is_finalizing() {
        if waited >= FINALIZE_WAIT {
            warn!("Gave up waiting for finalization after {:?}", FINALIZE_WAIT);
            return false;
        }
        thread::sleep(POLL_INTERVAL);
        waited += POLL_INTERVAL;
    }
    recorder.last_output().is_some()
}

fn drain_events(events: &mut tokio::sync::broadcast::Receiver<RecorderEvent>) {
    loop {
        match events.try_recv() {
            Ok(RecorderEvent::StateChanged(state)) => debug!("Recorder is now {}", state),
            Ok(RecorderEvent::Progress { .. }) => {}
            Ok(RecorderEvent::Finalized(Ok(summary))) => {
                info!(output = ?summary.output, outcome = ?summary.outcome, "Recording finalized");
            }
            Ok(RecorderEvent::Finalized(Err(e))) => warn!("Recording finalization failed: {}", e),
            Err(TryRecvError::Lagged(skipped)) => debug!("Skipped {} recorder events", skipped),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn render_progress(recorder: &Recorder) {
    let stats = recorder.statistics();
    let mut line = format!(
        "\r{} {}  {} frames",
        colors::state(stats.state),
        colors::elapsed_time(stats.duration),
        stats.frames_written
    );
    if stats.state == RecordingState::Recording {
        let channels = recorder.audio_channels();
        if channels.system {
            line.push_str(&format!(
                "  sys {}",
                colors::level_meter(stats.system_level, METER_WIDTH)
            ));
        }
        if channels.microphone {
            line.push_str(&format!(
                "  mic {}",
                colors::level_meter(stats.microphone_level, METER_WIDTH)
            ));
        }
    }
    line.push_str("   ");
    eprint!("{}", line);
    let _ = std::io::stderr().flush();
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// Print the effective configuration.
pub fn config_show(json: bool) -> anyhow::Result<ExitCode> {
    let app_config = config::load_config();
    if json {
        println!("{}", serde_json::to_string(&app_config)?);
        return Ok(ExitCode::Success);
    }

    if let Ok(path) = config::config_path() {
        println!(
            "{} {}",
            colors::bold("Config file:"),
            colors::path(&path.display().to_string())
        );
    }
    println!(
        "{} {}",
        colors::bold("Output directory:"),
        colors::path(&config::output_dir(&app_config).display().to_string())
    );
    println!("{}", serde_json::to_string_pretty(&app_config)?);
    Ok(ExitCode::Success)
}

/// Print the configuration file location.
pub fn config_path(json: bool) -> anyhow::Result<ExitCode> {
    let path = config::config_path()?;
    if json {
        println!("{}", serde_json::json!({ "config_path": path }));
    } else {
        println!("{}", path.display());
    }
    Ok(ExitCode::Success)
}

/// Write the default configuration to disk.
pub fn config_reset(json: bool, quiet: bool) -> anyhow::Result<ExitCode> {
    let path = config::save_config(&AppConfig::default())
        .context("Failed to write default configuration")?;
    if json {
        println!("{}", serde_json::json!({ "status": "reset", "config_path": path }));
    } else if !quiet {
        println!(
            "{} {}",
            colors::success("Configuration reset:"),
            colors::path(&path.display().to_string())
        );
    }
    Ok(ExitCode::Success)
}

/// Show version information.
pub fn version(json: bool) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let ffmpeg = resolve_ffmpeg_path();
    let log_file = reelcap_common::logging::app_log_path();

    if json {
        let info = serde_json::json!({
            "version": version,
            "ffmpeg": ffmpeg,
            "log_file": log_file,
        });
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!("{} {}", colors::bold("reelcap"), version);
        match ffmpeg {
            Some(path) => println!("ffmpeg: {}", colors::path(&path.display().to_string())),
            None => println!("ffmpeg: {}", colors::dim("not found")),
        }
        println!("logs:   {}", colors::path(&log_file.display().to_string()));
    }
    Ok(())
}
