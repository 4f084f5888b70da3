//! RecordingController - top-level Start/Stop sequencing
//!
//! Owns the scenario and the optional video engine, the recording flag and the
//! session folder: `<root>/archiveSource` while recording, renamed to the
//! session datetime (`%F-%H%M%S`) on stop.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use contracts::{
    ArchiveFactory, CaptureBlueprint, DepthMode, PoseLocator, ReferenceFrame, SensorDevice,
    SensorKind, VideoFrameSource,
};
use stream_engine::{LatestFrame, SensorEngineConfig, VideoStreamEngine};
use tracing::{error, info, instrument, warn};

use crate::error::{Result, ScenarioError};
use crate::scenario::StreamScenario;

/// Folder recorded into before the session is renamed.
pub const SESSION_FOLDER: &str = "archiveSource";

/// Any stream the controller can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Sensor(SensorKind),
    Video,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Sensor(kind) => write!(f, "{kind}"),
            StreamKind::Video => f.write_str("PV"),
        }
    }
}

/// Hardware-facing collaborators.
#[derive(Clone)]
pub struct CaptureDevices {
    pub sensors: Arc<dyn SensorDevice>,
    pub locator: Arc<dyn PoseLocator>,
    pub video: Option<Arc<dyn VideoFrameSource>>,
}

struct Session {
    folder: Option<PathBuf>,
    datetime: String,
}

pub struct RecordingController {
    devices: CaptureDevices,
    archive_factory: Arc<dyn ArchiveFactory>,
    config: SensorEngineConfig,
    recording_root: PathBuf,
    enabled: BTreeSet<SensorKind>,
    video_enabled: bool,
    recording: bool,
    scenario: Option<StreamScenario>,
    video: Option<VideoStreamEngine>,
    session: Option<Session>,
    last_session: Option<PathBuf>,
}

impl RecordingController {
    pub fn new(
        devices: CaptureDevices,
        archive_factory: Arc<dyn ArchiveFactory>,
        config: SensorEngineConfig,
        recording_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            devices,
            archive_factory,
            config,
            recording_root: recording_root.into(),
            enabled: BTreeSet::new(),
            video_enabled: false,
            recording: false,
            scenario: None,
            video: None,
            session: None,
            last_session: None,
        }
    }

    /// Streams, recording flag and root taken from a validated blueprint.
    pub fn from_blueprint(
        blueprint: &CaptureBlueprint,
        devices: CaptureDevices,
        archive_factory: Arc<dyn ArchiveFactory>,
    ) -> Self {
        let mut controller = Self::new(
            devices,
            archive_factory,
            SensorEngineConfig::from(&blueprint.engine),
            blueprint.recording.root.clone(),
        );
        for &kind in &blueprint.streams.sensors {
            controller.enable_stream(StreamKind::Sensor(kind));
        }
        if blueprint.streams.video {
            controller.enable_stream(StreamKind::Video);
        }
        controller.recording = blueprint.recording.enabled;
        controller
    }

    /// Marks a stream for registration. `false` once sensors are initialized.
    pub fn enable_stream(&mut self, stream: StreamKind) -> bool {
        if self.scenario.is_some() {
            warn!(stream = %stream, "streams are fixed after initialization");
            return false;
        }
        match stream {
            StreamKind::Sensor(kind) => {
                self.enabled.insert(kind);
            }
            StreamKind::Video => self.video_enabled = true,
        }
        true
    }

    pub fn enable_grayscale(&mut self, kind: SensorKind) -> bool {
        !kind.is_depth() && self.enable_stream(StreamKind::Sensor(kind))
    }

    pub fn enable_depth(&mut self, mode: DepthMode) -> bool {
        self.enable_stream(StreamKind::Sensor(SensorKind::for_depth_mode(mode)))
    }

    pub fn enable_video(&mut self) -> bool {
        self.enable_stream(StreamKind::Video)
    }

    /// Builds the sensor registry and registers the video callback.
    #[instrument(name = "controller_initialize_sensors", skip(self))]
    pub fn initialize_sensors(&mut self) -> Result<()> {
        if self.scenario.is_some() {
            return Err(ScenarioError::configuration("sensors already initialized"));
        }
        StreamScenario::check_selection(&self.enabled)?;

        let video_source = match (self.video_enabled, &self.devices.video) {
            (true, None) => {
                return Err(ScenarioError::configuration(
                    "video stream enabled but no video source available",
                ))
            }
            (true, Some(source)) => Some(Arc::clone(source)),
            (false, _) => None,
        };

        let mut scenario = StreamScenario::new(
            Arc::clone(&self.devices.sensors),
            Arc::clone(&self.devices.locator),
            Arc::clone(&self.archive_factory),
            self.config.clone(),
        );
        scenario.initialize_sensors(&self.enabled)?;

        if let Some(source) = video_source {
            let video = VideoStreamEngine::new(
                source,
                Arc::clone(&self.devices.locator),
                scenario.converter(),
                self.config.reference_frame.clone(),
                self.config.poll_interval,
            );
            video.initialize()?;
            self.video = Some(video);
        }

        self.scenario = Some(scenario);
        info!(sensors = self.enabled.len(), video = self.video.is_some(), "controller initialized");
        Ok(())
    }

    pub fn enable_recording(&mut self) -> bool {
        self.set_recording(true)
    }

    pub fn disable_recording(&mut self) -> bool {
        self.set_recording(false)
    }

    fn set_recording(&mut self, enabled: bool) -> bool {
        if self.is_running() {
            warn!(enabled, "cannot change recording while running");
            return false;
        }
        self.recording = enabled;
        true
    }

    pub fn is_recording_enabled(&self) -> bool {
        self.recording
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Starts every stream. `Ok(false)` when already running.
    #[instrument(name = "controller_start", skip(self))]
    pub fn start(&mut self, world: ReferenceFrame) -> Result<bool> {
        if self.is_running() {
            warn!("already running");
            return Ok(false);
        }
        let scenario = self
            .scenario
            .as_ref()
            .ok_or_else(|| ScenarioError::configuration("sensors not initialized"))?;

        let datetime = Local::now().format("%F-%H%M%S").to_string();
        let folder = if self.recording {
            let folder = self.recording_root.join(SESSION_FOLDER);
            if folder.exists() {
                fs::remove_dir_all(&folder)?;
            }
            fs::create_dir_all(&folder)?;
            Some(folder)
        } else {
            None
        };

        scenario.start_recording(folder.as_deref(), world.clone())?;
        if let Some(video) = &self.video {
            video.clear();
            if let Err(e) = video.start_recording(folder.as_deref(), self.archive_factory.as_ref(), world) {
                error!(error = %e, "video start failed, stopping sensors");
                if let Err(stop_err) = scenario.stop_recording() {
                    warn!(error = %stop_err, "rollback stop failed");
                }
                return Err(e.into());
            }
        }

        info!(recording = folder.is_some(), datetime = %datetime, "capture started");
        self.session = Some(Session { folder, datetime });
        Ok(true)
    }

    /// Stops video, dumps its metadata, stops the sensors, then renames the
    /// session folder. `Ok(false)` when not running.
    ///
    /// Every step runs; the first error is returned.
    #[instrument(name = "controller_stop", skip(self))]
    pub fn stop(&mut self) -> Result<bool> {
        let Some(session) = self.session.take() else {
            return Ok(false);
        };
        let mut first_error: Option<ScenarioError> = None;

        if let Some(video) = &self.video {
            video.stop_recording();
            if let Some(folder) = &session.folder {
                if let Err(e) = video.dump_data_to_disk(folder, &session.datetime) {
                    error!(error = %e, "video metadata dump failed");
                    first_error.get_or_insert(e.into());
                }
            }
        }

        if let Some(scenario) = &self.scenario {
            if let Err(e) = scenario.stop_recording() {
                first_error.get_or_insert(e);
            }
        }

        if let Some(folder) = &session.folder {
            match rename_session(folder, &self.recording_root, &session.datetime) {
                Ok(renamed) => {
                    info!(folder = %renamed.display(), "session saved");
                    self.last_session = Some(renamed);
                }
                Err(e) => {
                    error!(error = %e, "session rename failed");
                    first_error.get_or_insert(e.into());
                }
            }
        }

        info!("capture stopped");
        first_error.map_or(Ok(true), Err)
    }

    /// Folder of the most recently finished recording.
    pub fn last_session(&self) -> Option<&Path> {
        self.last_session.as_deref()
    }

    pub fn scenario(&self) -> Option<&StreamScenario> {
        self.scenario.as_ref()
    }

    pub fn video(&self) -> Option<&VideoStreamEngine> {
        self.video.as_ref()
    }

    fn registered(&self) -> Result<&StreamScenario> {
        self.scenario
            .as_ref()
            .ok_or_else(|| ScenarioError::configuration("sensors not initialized"))
    }

    /// Latest grayscale frame of a tracking camera, `None` if nothing new.
    pub fn latest_grayscale(&self, kind: SensorKind, flip: bool) -> Result<Option<LatestFrame>> {
        Ok(self.registered()?.engine(kind)?.latest_grayscale(flip)?)
    }

    /// Latest frame of the registered depth stream.
    pub fn latest_depth(&self) -> Result<Option<LatestFrame>> {
        let engine = self
            .registered()?
            .depth_engine()
            .ok_or_else(|| ScenarioError::configuration("no depth stream registered"))?;
        Ok(engine.latest_depth()?)
    }

    /// Latest converted BGRA video frame.
    pub fn latest_video(&self, flip: bool) -> Result<Option<LatestFrame>> {
        let video = self
            .video
            .as_ref()
            .ok_or_else(|| ScenarioError::configuration("video stream not registered"))?;
        let size = video.size();
        if size == 0 || !video.new_available() {
            return Ok(None);
        }
        let mut frame = LatestFrame::bgra_with_len(size);
        Ok(video.copy_last_frame(&mut frame, flip).then_some(frame))
    }

    /// Latest frame of any stream.
    pub fn latest_frame(&self, stream: StreamKind) -> Result<Option<LatestFrame>> {
        match stream {
            StreamKind::Video => self.latest_video(false),
            StreamKind::Sensor(kind) if kind.is_depth() => {
                Ok(self.registered()?.engine(kind)?.latest_depth()?)
            }
            StreamKind::Sensor(kind) => self.latest_grayscale(kind, false),
        }
    }

    /// `0` when the stream is not registered.
    pub fn width(&self, stream: StreamKind) -> u32 {
        self.dimensions(stream).0
    }

    /// `0` when the stream is not registered.
    pub fn height(&self, stream: StreamKind) -> u32 {
        self.dimensions(stream).1
    }

    fn dimensions(&self, stream: StreamKind) -> (u32, u32) {
        match stream {
            StreamKind::Video => self
                .video
                .as_ref()
                .map_or((0, 0), |video| (video.width(), video.height())),
            StreamKind::Sensor(kind) => self
                .scenario
                .as_ref()
                .and_then(|scenario| scenario.engine(kind).ok())
                .and_then(|engine| engine.resolution().ok())
                .map_or((0, 0), |r| (r.width, r.height)),
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "stop on drop failed");
        }
    }
}

/// Renames `folder` to `<root>/<datetime>`, adding `-<n>` if that name is taken.
fn rename_session(folder: &Path, root: &Path, datetime: &str) -> std::io::Result<PathBuf> {
    let mut target = root.join(datetime);
    let mut suffix = 1;
    while target.exists() {
        target = root.join(format!("{datetime}-{suffix}"));
        suffix += 1;
    }
    fs::rename(folder, &target)?;
    Ok(target)
}
