//! reelcap command-line interface
//!
//! A headless front end for the recording engine: enumerate capture
//! sources, record a monitor, window or region, and inspect configuration.

mod colors;
mod commands;
mod exit_codes;

use clap::{Args, Parser, Subcommand};
use exit_codes::ExitCode;
use reelcap_common::CaptureTarget;
use std::path::PathBuf;

/// reelcap - Screen Recording CLI
#[derive(Parser, Debug)]
#[command(name = "reelcap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show log output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available capture sources
    List {
        #[command(subcommand)]
        source: ListSource,
    },
    /// Record until stopped with 's' or Ctrl+C
    Record {
        #[command(subcommand)]
        target: RecordTarget,
    },
    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
enum ListSource {
    /// List available displays/monitors
    Displays,
    /// List capturable windows
    Windows,
    /// List audio devices (system audio outputs and microphones)
    Audio,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Overwrite the configuration file with defaults
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecordTarget {
    /// Record a whole monitor
    FullScreen {
        /// Monitor ID (use 'reelcap list displays' to find); primary when omitted
        #[arg(long)]
        monitor: Option<u32>,

        #[command(flatten)]
        options: RecordOptions,
    },
    /// Record the rectangle a window occupies when recording starts
    Window {
        /// Window ID (use 'reelcap list windows' to find)
        id: u32,

        #[command(flatten)]
        options: RecordOptions,
    },
    /// Record a rectangle in virtual desktop coordinates
    Region {
        /// Left edge (pixels)
        #[arg(long, allow_negative_numbers = true)]
        x: i32,

        /// Top edge (pixels)
        #[arg(long, allow_negative_numbers = true)]
        y: i32,

        /// Width (pixels, at least 100)
        #[arg(long)]
        width: u32,

        /// Height (pixels, at least 100)
        #[arg(long)]
        height: u32,

        #[command(flatten)]
        options: RecordOptions,
    },
}

impl RecordTarget {
    pub fn capture_target(&self) -> CaptureTarget {
        match self {
            RecordTarget::FullScreen { monitor, .. } => CaptureTarget::FullScreen { monitor: *monitor },
            RecordTarget::Window { id, .. } => CaptureTarget::Window { id: *id },
            RecordTarget::Region {
                x,
                y,
                width,
                height,
                ..
            } => CaptureTarget::Region {
                left: *x,
                top: *y,
                width: *width,
                height: *height,
            },
        }
    }

    pub fn options(&self) -> &RecordOptions {
        match self {
            RecordTarget::FullScreen { options, .. }
            | RecordTarget::Window { options, .. }
            | RecordTarget::Region { options, .. } => options,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordOptions {
    /// Output file path (overrides the configured output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Quality preset: low, medium, high
    #[arg(long, conflicts_with = "bitrate")]
    pub quality: Option<String>,

    /// Explicit video bitrate such as 6M (implies custom quality)
    #[arg(long)]
    pub bitrate: Option<String>,

    /// Output resolution: native, 720p, 1080p, 1440p, 4k
    #[arg(long)]
    pub resolution: Option<String>,

    /// Do not record system audio
    #[arg(long)]
    pub no_system_audio: bool,

    /// Do not record the microphone
    #[arg(long)]
    pub no_mic: bool,

    /// System audio device name (use 'reelcap list audio' to find)
    #[arg(long)]
    pub system_device: Option<String>,

    /// Microphone device name (use 'reelcap list audio' to find)
    #[arg(long)]
    pub mic_device: Option<String>,

    /// Count down this many seconds before recording (0 disables)
    #[arg(long)]
    pub countdown: Option<u32>,

    /// Auto-stop after this many seconds of recorded time
    #[arg(short, long)]
    pub duration: Option<u64>,
}

fn main() {
    let cli = Cli::parse();

    let guard = match reelcap_lib::logging::init_logging(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            if !cli.quiet {
                eprintln!(
                    "{}",
                    colors::warning(&format!("File logging disabled: {}", e))
                );
            }
            None
        }
    };

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("{}", colors::error(&format!("{:#}", e)));
            }
            ExitCode::GeneralError
        }
    };

    // Flush buffered log lines; process::exit skips destructors
    drop(guard);
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::List { source } => match source {
            ListSource::Displays => commands::list_displays(cli.json, cli.quiet),
            ListSource::Windows => commands::list_windows(cli.json, cli.quiet),
            ListSource::Audio => commands::list_audio(cli.json, cli.quiet),
        },
        Commands::Record { target } => commands::record(target, cli.json, cli.quiet),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(cli.json),
            ConfigAction::Path => commands::config_path(cli.json),
            ConfigAction::Reset => commands::config_reset(cli.json, cli.quiet),
        },
        Commands::Version => {
            commands::version(cli.json)?;
            Ok(ExitCode::Success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Verify the CLI definition is valid
    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_list_displays() {
        let cli = Cli::try_parse_from(["reelcap", "list", "displays"]).unwrap();
        assert!(!cli.json);
        assert!(!cli.quiet);
        assert!(!cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::List {
                source: ListSource::Displays
            }
        ));
    }

    #[test]
    fn parse_list_audio_with_json() {
        let cli = Cli::try_parse_from(["reelcap", "--json", "list", "audio"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::List {
                source: ListSource::Audio
            }
        ));
    }

    /// Global flags are accepted after the subcommand
    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["reelcap", "list", "windows", "--json", "-q"]).unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
    }

    #[test]
    fn parse_record_full_screen_defaults() {
        let cli = Cli::try_parse_from(["reelcap", "record", "full-screen"]).unwrap();
        match cli.command {
            Commands::Record { target } => {
                assert_eq!(
                    target.capture_target(),
                    CaptureTarget::FullScreen { monitor: None }
                );
                let options = target.options();
                assert!(options.output.is_none());
                assert!(options.fps.is_none());
                assert!(!options.no_system_audio);
                assert!(!options.no_mic);
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn parse_record_full_screen_on_monitor() {
        let cli =
            Cli::try_parse_from(["reelcap", "record", "full-screen", "--monitor", "2"]).unwrap();
        match cli.command {
            Commands::Record { target } => {
                assert_eq!(
                    target.capture_target(),
                    CaptureTarget::FullScreen { monitor: Some(2) }
                );
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn parse_record_window() {
        let cli = Cli::try_parse_from(["reelcap", "record", "window", "12345"]).unwrap();
        match cli.command {
            Commands::Record { target } => {
                assert_eq!(target.capture_target(), CaptureTarget::Window { id: 12345 });
            }
            _ => panic!("Expected Record command"),
        }
    }

    /// Regions left of the primary monitor have negative coordinates
    #[test]
    fn parse_record_region_with_negative_origin() {
        let cli = Cli::try_parse_from([
            "reelcap", "record", "region", "--x", "-1920", "--y", "-200", "--width", "800",
            "--height", "600",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { target } => {
                assert_eq!(
                    target.capture_target(),
                    CaptureTarget::Region {
                        left: -1920,
                        top: -200,
                        width: 800,
                        height: 600
                    }
                );
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn parse_record_with_options() {
        let cli = Cli::try_parse_from([
            "reelcap",
            "record",
            "full-screen",
            "-o",
            "/tmp/clip.mp4",
            "--fps",
            "60",
            "--quality",
            "medium",
            "--resolution",
            "1080p",
            "--no-mic",
            "--countdown",
            "5",
            "-d",
            "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { target } => {
                let options = target.options();
                assert_eq!(options.output, Some(PathBuf::from("/tmp/clip.mp4")));
                assert_eq!(options.fps, Some(60));
                assert_eq!(options.quality.as_deref(), Some("medium"));
                assert_eq!(options.resolution.as_deref(), Some("1080p"));
                assert!(options.no_mic);
                assert!(!options.no_system_audio);
                assert_eq!(options.countdown, Some(5));
                assert_eq!(options.duration, Some(30));
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn quality_and_bitrate_conflict() {
        let result = Cli::try_parse_from([
            "reelcap",
            "record",
            "full-screen",
            "--quality",
            "low",
            "--bitrate",
            "4M",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_config_actions() {
        let cli = Cli::try_parse_from(["reelcap", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
        let cli = Cli::try_parse_from(["reelcap", "config", "reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Reset
            }
        ));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::try_parse_from(["reelcap", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn parse_invalid_command() {
        assert!(Cli::try_parse_from(["reelcap", "invalid"]).is_err());
    }

    #[test]
    fn parse_missing_window_id() {
        assert!(Cli::try_parse_from(["reelcap", "record", "window"]).is_err());
    }

    #[test]
    fn parse_missing_region_flags() {
        assert!(Cli::try_parse_from(["reelcap", "record", "region", "--x", "0"]).is_err());
    }
}
