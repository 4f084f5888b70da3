//! Capture session driver.
//!
//! Runs a [`RecordingController`] on a blocking worker: start, poll every
//! registered stream as a consumer would, stop on shutdown or timeout.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AbsoluteTicks, ReferenceFrame};
use observability::{CaptureMetricsAggregator, MetricsSummary};
use scenario::{RecordingController, StreamKind};
use stream_engine::{LatestFrame, VideoStreamEngine};
use tracing::{debug, info, instrument, warn};

use crate::error::CliError;

/// Session options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// World frame every pose is expressed in
    pub world: ReferenceFrame,
    /// Sleep between consumer polls
    pub poll_interval: Duration,
    /// Stop automatically after this long
    pub max_duration: Option<Duration>,
    /// Flip grayscale and video frames when polling
    pub flip: bool,
}

/// Color camera counters read before shutdown
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoCounters {
    pub arrived: u64,
    pub converted: u64,
    pub copied_in_context: u64,
    pub copied_to_client: u64,
}

impl From<&VideoStreamEngine> for VideoCounters {
    fn from(engine: &VideoStreamEngine) -> Self {
        Self {
            arrived: engine.arrived_frames(),
            converted: engine.converted_frames(),
            copied_in_context: engine.copied_in_context_frames(),
            copied_to_client: engine.copied_to_client_frames(),
        }
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub duration: Duration,
    pub streams: Vec<String>,
    pub recorded: bool,
    pub consumer: MetricsSummary,
    pub video: Option<VideoCounters>,
    pub session_folder: Option<PathBuf>,
}

impl SessionStats {
    /// Frames pulled by the consumer across all streams
    pub fn frames_consumed(&self) -> u64 {
        self.consumer.streams.values().map(|s| s.frames).sum()
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Capture Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Streams: {}", self.streams.join(", "));
        println!("   ├─ Frames consumed: {}", self.frames_consumed());
        println!("   └─ Recording: {}", if self.recorded { "on" } else { "off" });

        println!();
        print!("{}", self.consumer);

        if let Some(video) = &self.video {
            println!("\nColor camera");
            println!("   ├─ Arrived: {}", video.arrived);
            println!("   ├─ Converted: {}", video.converted);
            println!("   ├─ Copied in context: {}", video.copied_in_context);
            println!("   └─ Copied to client: {}", video.copied_to_client);
        }

        if let Some(folder) = &self.session_folder {
            println!("\nSession saved to {}", folder.display());
        }
    }
}

/// Streams registered on an initialized controller, in polling order.
pub fn registered_streams(controller: &RecordingController) -> Vec<StreamKind> {
    let mut streams: Vec<StreamKind> = controller
        .scenario()
        .map(|scenario| scenario.kinds().map(StreamKind::Sensor).collect())
        .unwrap_or_default();
    if controller.video().is_some() {
        streams.push(StreamKind::Video);
    }
    streams
}

/// Runs one capture session to completion.
///
/// Blocks the calling thread; `shutdown` ends the polling loop early.
#[instrument(name = "capture_session", skip_all, fields(world = %config.world))]
pub fn run_session(
    mut controller: RecordingController,
    config: SessionConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<SessionStats> {
    controller
        .initialize_sensors()
        .context("Failed to initialize sensors")?;

    let streams = registered_streams(&controller);
    if streams.is_empty() {
        return Err(CliError::capture("no stream registered").into());
    }
    let recorded = controller.is_recording_enabled();

    if !controller
        .start(config.world.clone())
        .context("Failed to start capture")?
    {
        return Err(CliError::capture("controller is already running").into());
    }
    info!(streams = streams.len(), recorded, "Capture running");

    let started = Instant::now();
    let mut aggregator = CaptureMetricsAggregator::new();

    while !shutdown.load(Ordering::Relaxed) {
        if config
            .max_duration
            .is_some_and(|max| started.elapsed() >= max)
        {
            info!("Capture duration reached");
            break;
        }
        for stream in &streams {
            if let Some(timestamp) = poll_stream(&controller, *stream, config.flip) {
                aggregator.observe(&stream.to_string(), timestamp);
            }
        }
        thread::sleep(config.poll_interval);
    }

    let duration = started.elapsed();
    let video = controller.video().map(VideoCounters::from);
    controller.stop().context("Failed to stop capture")?;

    Ok(SessionStats {
        duration,
        streams: streams.iter().map(ToString::to_string).collect(),
        recorded,
        consumer: aggregator.summary(),
        video,
        session_folder: controller.last_session().map(PathBuf::from),
    })
}

fn poll_stream(
    controller: &RecordingController,
    stream: StreamKind,
    flip: bool,
) -> Option<AbsoluteTicks> {
    let frame: scenario::Result<Option<LatestFrame>> = match stream {
        StreamKind::Sensor(kind) if kind.is_depth() => controller.latest_depth(),
        StreamKind::Sensor(kind) => controller.latest_grayscale(kind, flip),
        StreamKind::Video => controller.latest_video(flip),
    };
    match frame {
        Ok(Some(frame)) => {
            debug!(stream = %stream, timestamp = %frame.timestamp, "Frame consumed");
            Some(frame.timestamp)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(stream = %stream, error = %e, "Frame poll failed");
            None
        }
    }
}
