//! `record` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{CaptureBlueprint, ReferenceFrame, SensorKind};
use mock_device::{
    MockDeviceConfig, MockPoseLocator, MockSensorDevice, MockVideoConfig, MockVideoSource,
};
use scenario::{CaptureDevices, RecordingController};
use tracing::{info, warn};

use crate::cli::RecordArgs;
use crate::error::CliError;
use crate::session::{run_session, SessionConfig};

/// Execute the `record` command
pub async fn run_record(args: &RecordArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut blueprint, args);

    info!(
        sensors = blueprint.streams.sensors.len(),
        video = blueprint.streams.video,
        recording = blueprint.recording.enabled,
        root = %blueprint.recording.root.display(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let controller = RecordingController::from_blueprint(
        &blueprint,
        simulated_devices(&blueprint, args.sensor_rate),
        archive::factory_for(blueprint.recording.container),
    );
    let session_config = SessionConfig {
        world: ReferenceFrame::new(&blueprint.engine.reference_frame),
        poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        max_duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        flip: args.flip,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_task = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            setup_shutdown_signal().await;
            warn!("Received shutdown signal, stopping capture...");
            shutdown.store(true, Ordering::Relaxed);
        })
    };

    info!("Starting capture...");
    let worker = {
        let shutdown = Arc::clone(&shutdown);
        tokio::task::spawn_blocking(move || run_session(controller, session_config, shutdown))
    };
    let outcome = worker.await.context("Capture worker panicked");
    signal_task.abort();

    let stats = outcome?.context("Capture session failed")?;
    info!(
        frames = stats.frames_consumed(),
        duration_secs = stats.duration.as_secs_f64(),
        "Capture completed"
    );
    stats.print_summary();

    info!("HMD Capture finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut CaptureBlueprint, args: &RecordArgs) {
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding recording root from CLI");
        blueprint.recording.root = output.clone();
    }
    if args.record {
        blueprint.recording.enabled = true;
    }
    if args.no_record {
        blueprint.recording.enabled = false;
    }
}

/// Simulated device sharing one clock between sensors and color camera.
fn simulated_devices(blueprint: &CaptureBlueprint, sensor_rate: f64) -> CaptureDevices {
    let device = MockSensorDevice::new(MockDeviceConfig {
        frequency_hz: sensor_rate,
        sensors: SensorKind::ALL.to_vec(),
        ..MockDeviceConfig::default()
    });
    let video = blueprint.streams.video.then(|| {
        Arc::new(MockVideoSource::new(
            MockVideoConfig::default(),
            device.clock().clone(),
        )) as Arc<dyn contracts::VideoFrameSource>
    });
    CaptureDevices {
        sensors: Arc::new(device),
        locator: Arc::new(MockPoseLocator::new()),
        video,
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &CaptureBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Version: {:?}", blueprint.version);

    println!("\nStreams:");
    for kind in &blueprint.streams.sensors {
        println!("  - {} ({})", kind.friendly_name(), kind.frame_kind());
    }
    if blueprint.streams.video {
        println!("  - PV (color video)");
    }

    println!("\nRecording:");
    println!("  Enabled: {}", blueprint.recording.enabled);
    println!("  Root: {}", blueprint.recording.root.display());
    println!("  Container: {:?}", blueprint.recording.container);

    println!("\nEngine:");
    println!("  Reference frame: {}", blueprint.engine.reference_frame);
    println!("  Poll interval: {}ms", blueprint.engine.consent_poll_ms);
    println!(
        "  Transient retry limit: {}",
        blueprint.engine.transient_retry_limit
    );

    println!("\n=============================\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(config: std::path::PathBuf, output: std::path::PathBuf) -> RecordArgs {
        RecordArgs {
            config,
            output: Some(output),
            no_record: false,
            record: true,
            duration: 0,
            poll_ms: 10,
            sensor_rate: 60.0,
            flip: false,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = CaptureBlueprint::default();
        let mut record = args(dir.path().join("c.toml"), dir.path().join("out"));

        apply_overrides(&mut blueprint, &record);
        assert!(blueprint.recording.enabled);
        assert_eq!(blueprint.recording.root, dir.path().join("out"));

        record.record = false;
        record.no_record = true;
        apply_overrides(&mut blueprint, &record);
        assert!(!blueprint.recording.enabled);
    }

    #[tokio::test]
    async fn test_missing_config_reported() {
        let dir = tempfile::tempdir().unwrap();
        let record = args(dir.path().join("missing.toml"), dir.path().to_path_buf());

        let err = run_record(&record).await.unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_capture() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("capture.toml");
        let mut file = std::fs::File::create(&config).unwrap();
        writeln!(file, "[streams]\nsensors = [\"left_front\"]").unwrap();

        let mut record = args(config, dir.path().join("out"));
        record.dry_run = true;

        run_record(&record).await.unwrap();
        assert!(!dir.path().join("out").exists());
    }
}
