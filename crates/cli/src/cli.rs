//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// HMD Capture - multi-sensor capture and recording for head-mounted devices
#[derive(Parser, Debug)]
#[command(
    name = "hmd-capture",
    author,
    version,
    about = "Head-mounted device sensor capture",
    long_about = "Streams the tracking cameras, one depth mode and the color camera of a \n\
                  head-mounted device, attaches a world pose to every frame and \n\
                  optionally records each stream into a per-session archive folder."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "HMD_CAPTURE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "HMD_CAPTURE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture (and optionally record) the configured streams
    Record(RecordArgs),

    /// Validate configuration file without capturing
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `record` command
#[derive(Parser, Debug, Clone)]
pub struct RecordArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "capture.toml", env = "HMD_CAPTURE_CONFIG")]
    pub config: PathBuf,

    /// Override the recording root folder
    #[arg(short, long, env = "HMD_CAPTURE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Capture without writing archives, regardless of configuration
    #[arg(long, conflicts_with = "record")]
    pub no_record: bool,

    /// Write archives, regardless of configuration
    #[arg(long)]
    pub record: bool,

    /// Capture duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "HMD_CAPTURE_DURATION")]
    pub duration: u64,

    /// Interval between consumer polls in milliseconds
    #[arg(long, default_value = "33", env = "HMD_CAPTURE_POLL_MS")]
    pub poll_ms: u64,

    /// Frame rate of the simulated research-mode sensors
    #[arg(long, default_value = "30", env = "HMD_CAPTURE_SENSOR_RATE")]
    pub sensor_rate: f64,

    /// Flip grayscale and video frames vertically when polling
    #[arg(long)]
    pub flip: bool,

    /// Validate configuration and exit without capturing
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "HMD_CAPTURE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "capture.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "capture.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-stream details (frame type, archive entry names)
    #[arg(long)]
    pub streams: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
