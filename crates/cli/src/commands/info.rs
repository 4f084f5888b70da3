//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CaptureBlueprint, FrameKind, SensorKind};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    streams: Vec<StreamInfo>,
    recording: RecordingInfo,
    engine: EngineInfo,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    archive_entries: Vec<String>,
}

#[derive(Serialize)]
struct RecordingInfo {
    enabled: bool,
    root: String,
    container: String,
}

#[derive(Serialize)]
struct EngineInfo {
    reference_frame: String,
    consent_poll_ms: u64,
    transient_retry_limit: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn sensor_info(kind: SensorKind, details: bool) -> StreamInfo {
    let frame_kind = kind.frame_kind();
    let archive_entries = if details {
        match frame_kind {
            FrameKind::Grayscale => vec!["<timestamp>.pgm".to_string()],
            FrameKind::Depth(_) => vec![
                "<timestamp>_ab.pgm".to_string(),
                "<timestamp>.pgm".to_string(),
            ],
        }
    } else {
        Vec::new()
    };
    StreamInfo {
        name: kind.friendly_name().to_string(),
        frame_type: details.then(|| frame_kind.to_string()),
        archive_entries,
    }
}

fn build_config_info(blueprint: &CaptureBlueprint, args: &InfoArgs) -> ConfigInfo {
    let mut streams: Vec<StreamInfo> = blueprint
        .streams
        .sensors
        .iter()
        .map(|&kind| sensor_info(kind, args.streams))
        .collect();
    if blueprint.streams.video {
        streams.push(StreamInfo {
            name: "PV".to_string(),
            frame_type: args.streams.then(|| "color (BGRA)".to_string()),
            archive_entries: if args.streams {
                vec!["<timestamp>.bytes".to_string()]
            } else {
                Vec::new()
            },
        });
    }

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        streams,
        recording: RecordingInfo {
            enabled: blueprint.recording.enabled,
            root: blueprint.recording.root.display().to_string(),
            container: format!("{:?}", blueprint.recording.container),
        },
        engine: EngineInfo {
            reference_frame: blueprint.engine.reference_frame.clone(),
            consent_poll_ms: blueprint.engine.consent_poll_ms,
            transient_retry_limit: blueprint.engine.transient_retry_limit,
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 HMD Capture Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Version: {}\n", info.version);

    println!("Streams ({})", info.streams.len());
    for (i, stream) in info.streams.iter().enumerate() {
        let branch = if i + 1 == info.streams.len() { "└─" } else { "├─" };
        match &stream.frame_type {
            Some(frame_type) => println!("   {} {} [{}]", branch, stream.name, frame_type),
            None => println!("   {} {}", branch, stream.name),
        }
        if !stream.archive_entries.is_empty() {
            println!("        entries: {}", stream.archive_entries.join(", "));
        }
    }

    println!("\nRecording");
    println!("   ├─ Enabled: {}", info.recording.enabled);
    println!("   ├─ Root: {}", info.recording.root);
    println!("   └─ Container: {}", info.recording.container);

    println!("\nEngine");
    println!("   ├─ Reference frame: {}", info.engine.reference_frame);
    println!("   ├─ Poll interval: {}ms", info.engine.consent_poll_ms);
    println!(
        "   └─ Transient retry limit: {}",
        info.engine.transient_retry_limit
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StreamsConfig;

    #[test]
    fn test_stream_details() {
        let blueprint = CaptureBlueprint {
            streams: StreamsConfig {
                sensors: vec![SensorKind::RightFront, SensorKind::DepthLongThrow],
                video: true,
            },
            ..Default::default()
        };
        let args = InfoArgs {
            config: "capture.toml".into(),
            json: true,
            streams: true,
        };

        let info = build_config_info(&blueprint, &args);
        let names: Vec<_> = info.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["VLC RF", "Long Throw", "PV"]);
        assert_eq!(info.streams[1].archive_entries.len(), 2);
        assert_eq!(
            info.streams[1].frame_type.as_deref(),
            Some("depth (long range)")
        );
    }

    #[test]
    fn test_summary_without_details() {
        let blueprint = CaptureBlueprint::default();
        let args = InfoArgs {
            config: "capture.toml".into(),
            json: false,
            streams: false,
        };
        let info = build_config_info(&blueprint, &args);
        assert!(info.streams.is_empty());
        assert_eq!(info.engine.reference_frame, "world");
        assert_eq!(info.recording.container, "Tar");
    }
}
