//! VideoStreamEngine - color camera pipeline
//!
//! The arrival callback only parks the newest frame in a single-slot mailbox.
//! A dedicated grab thread converts it to BGRA8, attaches pose and intrinsics,
//! publishes it to the [`FrameCache`] and, while recording, appends it to the
//! archive and the metadata log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{
    AbsoluteTicks, ArchiveFactory, ArchiveWriter, CameraIntrinsics, FrameHeader, PixelBuffer,
    PoseLocator, ReferenceFrame, RelativeTicks, RigPose, VideoFrame, VideoFrameCallback,
    VideoFrameSource,
};
use observability::VideoCounter;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::consumer::LatestFrame;
use crate::error::{EngineError, Result};
use crate::frame_cache::FrameCache;
use crate::pose::{cv_camera_transform, format_column_major};
use crate::raster::{convert_to_bgra, flip_vertical_in_place};
use crate::time::TimeConverter;

const VIDEO_NAME: &str = "PV";

/// One logged frame for the metadata dump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoLogEntry {
    pub timestamp: AbsoluteTicks,
    pub fx: f32,
    pub fy: f32,
    pub pose: RigPose,
}

#[derive(Default)]
struct VideoStorage {
    folder: Option<PathBuf>,
    archive: Option<Box<dyn ArchiveWriter>>,
    log: Vec<VideoLogEntry>,
}

#[derive(Default)]
struct Counters {
    arrived: AtomicU64,
    converted: AtomicU64,
    copied_in_context: AtomicU64,
    copied_to_client: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    fn bump(&self, kind: VideoCounter) {
        let counter = match kind {
            VideoCounter::Arrived => &self.arrived,
            VideoCounter::Converted => &self.converted,
            VideoCounter::CopiedInContext => &self.copied_in_context,
            VideoCounter::CopiedToClient => &self.copied_to_client,
            VideoCounter::Malformed => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        observability::record_video_frame(kind);
    }
}

struct VideoShared {
    mailbox: Mutex<Option<Arc<VideoFrame>>>,
    arrival: Condvar,
    cache: FrameCache,
    storage: Mutex<VideoStorage>,
    world: RwLock<ReferenceFrame>,
    locator: Arc<dyn PoseLocator>,
    converter: TimeConverter,
    counters: Counters,
    exit: AtomicBool,
    poll_interval: Duration,
}

/// Color camera engine
pub struct VideoStreamEngine {
    shared: Arc<VideoShared>,
    source: Arc<dyn VideoFrameSource>,
    initialized: AtomicBool,
    grabber: Mutex<Option<JoinHandle<()>>>,
}

impl VideoStreamEngine {
    pub fn new(
        source: Arc<dyn VideoFrameSource>,
        locator: Arc<dyn PoseLocator>,
        converter: TimeConverter,
        world: ReferenceFrame,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(VideoShared {
                mailbox: Mutex::new(None),
                arrival: Condvar::new(),
                cache: FrameCache::new(),
                storage: Mutex::new(VideoStorage::default()),
                world: RwLock::new(world),
                locator,
                converter,
                counters: Counters::default(),
                exit: AtomicBool::new(false),
                poll_interval,
            }),
            source,
            initialized: AtomicBool::new(false),
            grabber: Mutex::new(None),
        }
    }

    /// Registers the arrival callback with the source. Idempotent.
    #[instrument(skip(self))]
    pub fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let callback: VideoFrameCallback = Arc::new(move |frame: Arc<VideoFrame>| {
            let mut slot = shared.mailbox.lock();
            *slot = Some(frame);
            shared.counters.bump(VideoCounter::Arrived);
            shared.arrival.notify_one();
        });

        if let Err(e) = self.source.start(callback) {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(EngineError::driver(VIDEO_NAME, e));
        }
        info!("video source started");
        Ok(())
    }

    /// Sets the world frame, opens `<folder>/PV` and spawns the grab thread.
    ///
    /// When the grab thread is already running only the world frame changes.
    #[instrument(skip(self, factory))]
    pub fn start_recording(
        &self,
        folder: Option<&Path>,
        factory: &dyn ArchiveFactory,
        world: ReferenceFrame,
    ) -> Result<()> {
        *self.shared.world.write() = world;

        let mut grabber = self.grabber.lock();
        if grabber.is_some() {
            debug!("grab thread already running");
            return Ok(());
        }

        {
            let mut storage = self.shared.storage.lock();
            storage.folder = folder.map(Path::to_path_buf);
            if let Some(folder) = folder {
                let archive = factory
                    .create(&folder.join(VIDEO_NAME))
                    .map_err(|e| EngineError::archive(VIDEO_NAME, e.to_string()))?;
                info!(archive = %archive.location().display(), "video archive opened");
                storage.archive = Some(archive);
            }
        }

        self.shared.exit.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("video-grab".to_string())
            .spawn(move || grab_loop(shared))?;
        *grabber = Some(handle);
        Ok(())
    }

    /// Joins the grab thread and closes the archive.
    #[instrument(skip(self))]
    pub fn stop_recording(&self) {
        let mut grabber = self.grabber.lock();
        if let Some(handle) = grabber.take() {
            self.shared.exit.store(true, Ordering::SeqCst);
            {
                let _slot = self.shared.mailbox.lock();
                self.shared.arrival.notify_all();
            }
            if handle.join().is_err() {
                error!("grab thread panicked");
            }
        }

        let mut storage = self.shared.storage.lock();
        if let Some(mut archive) = storage.archive.take() {
            match archive.close() {
                Ok(()) => info!(archive = %archive.location().display(), "video archive closed"),
                Err(e) => error!(error = %e, "video archive close failed"),
            }
        }
        storage.folder = None;
    }

    pub fn is_recording(&self) -> bool {
        self.grabber.lock().is_some()
    }

    /// Copies the latest frame into a pre-sized BGRA destination.
    ///
    /// Returns `false` without touching `dest` when its buffer length differs
    /// from the cached frame.
    pub fn copy_last_frame(&self, dest: &mut LatestFrame, flip: bool) -> bool {
        let copied = self.shared.cache.read_latest(|record| {
            if dest.pixels.byte_len() != record.pixels.byte_len() || !dest.pixels.copy_from(&record.pixels) {
                return false;
            }
            dest.timestamp = record.header.timestamp;
            dest.pose = cv_camera_transform(&record.header.pose);
            dest.intrinsics = record.header.intrinsics;
            dest.width = record.header.width;
            dest.height = record.header.height;
            true
        });
        if !copied {
            return false;
        }

        if flip {
            if let PixelBuffer::Bgra8(data) = &mut dest.pixels {
                flip_vertical_in_place(data, dest.width as usize * 4);
            }
        }
        self.shared.counters.bump(VideoCounter::CopiedToClient);
        true
    }

    pub fn new_available(&self) -> bool {
        self.shared.cache.is_new_available()
    }

    pub fn width(&self) -> u32 {
        self.shared.cache.width()
    }

    pub fn height(&self) -> u32 {
        self.shared.cache.height()
    }

    /// Bytes in the converted BGRA buffer.
    pub fn size(&self) -> usize {
        self.shared.cache.size()
    }

    pub fn arrived_frames(&self) -> u64 {
        self.shared.counters.arrived.load(Ordering::Relaxed)
    }

    pub fn converted_frames(&self) -> u64 {
        self.shared.counters.converted.load(Ordering::Relaxed)
    }

    pub fn copied_in_context_frames(&self) -> u64 {
        self.shared.counters.copied_in_context.load(Ordering::Relaxed)
    }

    pub fn copied_to_client_frames(&self) -> u64 {
        self.shared.counters.copied_to_client.load(Ordering::Relaxed)
    }

    /// Frames dropped because their buffer did not match the resolution
    pub fn malformed_frames(&self) -> u64 {
        self.shared.counters.malformed.load(Ordering::Relaxed)
    }

    pub fn log_len(&self) -> usize {
        self.shared.storage.lock().log.len()
    }

    /// Empties the metadata log.
    pub fn clear(&self) {
        self.shared.storage.lock().log.clear();
    }

    /// Writes `<folder>/<datetime>_pv.txt`.
    ///
    /// Header: `cx,cy,width,height` of the latest arrived frame. Then one
    /// `timestamp,fx,fy,<16 pose values>` line per logged frame.
    #[instrument(skip(self))]
    pub fn dump_data_to_disk(&self, folder: &Path, datetime: &str) -> Result<PathBuf> {
        let intrinsics = self
            .shared
            .mailbox
            .lock()
            .as_ref()
            .map(|frame| frame.intrinsics)
            .unwrap_or_default();

        let storage = self.shared.storage.lock();
        let mut text = format!(
            "{},{},{},{}\n",
            intrinsics.cx, intrinsics.cy, intrinsics.width, intrinsics.height
        );
        for entry in &storage.log {
            text.push_str(&format!(
                "{},{},{},{}\n",
                entry.timestamp,
                entry.fx,
                entry.fy,
                format_column_major(entry.pose.matrix())
            ));
        }

        let path = folder.join(format!("{datetime}_pv.txt"));
        fs::write(&path, text)?;
        debug!(path = %path.display(), frames = storage.log.len(), "video metadata written");
        Ok(path)
    }

    /// Stops recording and the source.
    pub fn shutdown(&self) {
        self.stop_recording();
        if self.initialized.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.source.stop() {
                warn!(error = %e, "video source stop failed");
            }
        }
    }
}

impl Drop for VideoStreamEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn grab_loop(shared: Arc<VideoShared>) {
    debug!("grab thread started");
    let mut last: Option<RelativeTicks> = None;
    let mut pose = RigPose::identity();
    let mut pixels = PixelBuffer::Bgra8(Vec::new());

    loop {
        let frame = {
            let mut slot = shared.mailbox.lock();
            if slot.as_ref().map(|f| f.timestamp) == last && !shared.exit.load(Ordering::SeqCst) {
                shared.arrival.wait_for(&mut slot, shared.poll_interval);
            }
            slot.clone()
        };
        if shared.exit.load(Ordering::SeqCst) {
            break;
        }
        let Some(frame) = frame else {
            continue;
        };
        if Some(frame.timestamp) == last {
            continue;
        }
        last = Some(frame.timestamp);
        process_frame(&shared, &frame, &mut pose, &mut pixels);
    }
    debug!("grab thread exited");
}

fn process_frame(shared: &VideoShared, frame: &VideoFrame, pose: &mut RigPose, pixels: &mut PixelBuffer) {
    let timestamp = shared.converter.relative_to_absolute(frame.timestamp);
    let location = {
        let world = shared.world.read();
        shared.locator.locate(frame.timestamp, &world)
    };
    match location {
        Some(location) => *pose = RigPose::from_location(&location),
        None => trace!(timestamp = timestamp.0, "tracking lost, keeping previous pose"),
    }

    if let PixelBuffer::Bgra8(buf) = pixels {
        convert_to_bgra(frame.format, &frame.data, buf);
    }
    let expected = frame.width as usize * frame.height as usize * 4;
    if pixels.byte_len() != expected {
        warn!(
            timestamp = timestamp.0,
            width = frame.width,
            height = frame.height,
            bytes = frame.data.len(),
            "video buffer size does not match resolution, frame dropped"
        );
        shared.counters.bump(VideoCounter::Malformed);
        return;
    }
    let intrinsics = CameraIntrinsics {
        width: frame.width,
        height: frame.height,
        ..frame.intrinsics
    };
    let header = FrameHeader {
        timestamp,
        pose: *pose,
        intrinsics: Some(intrinsics),
        width: frame.width,
        height: frame.height,
    };
    shared.counters.bump(VideoCounter::Converted);

    if shared.cache.publish_from(header, pixels) {
        shared.counters.bump(VideoCounter::CopiedInContext);
    }

    let mut storage = shared.storage.lock();
    let Some(archive) = storage.archive.as_mut() else {
        return;
    };
    let PixelBuffer::Bgra8(data) = &*pixels else {
        return;
    };
    if let Err(e) = archive.add_entry(&format!("{timestamp}.bytes"), data) {
        error!(timestamp = timestamp.0, error = %e, "video archive append failed");
        observability::record_archive_write_failure(VIDEO_NAME);
        return;
    }
    storage.log.push(VideoLogEntry {
        timestamp,
        fx: intrinsics.fx,
        fy: intrinsics.fy,
        pose: *pose,
    });
    observability::record_frame_persisted(VIDEO_NAME);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use archive::MemoryArchiveFactory;
    use contracts::VideoPixelFormat;
    use mock_device::{MockClock, MockPoseLocator, MockVideoConfig, MockVideoSource};

    fn engine_with(config: MockVideoConfig, locator: MockPoseLocator) -> (VideoStreamEngine, Arc<MockVideoSource>) {
        let source = Arc::new(MockVideoSource::new(config, MockClock::default()));
        let engine = VideoStreamEngine::new(
            source.clone(),
            Arc::new(locator),
            TimeConverter::with_offset(0),
            ReferenceFrame::new("world"),
            Duration::from_millis(5),
        );
        (engine, source)
    }

    /// Delivers a fixed list of frames once, 20ms apart.
    struct ScriptedSource {
        frames: Vec<VideoFrame>,
        worker: Mutex<Option<JoinHandle<()>>>,
    }

    impl VideoFrameSource for ScriptedSource {
        fn start(&self, callback: VideoFrameCallback) -> contracts::Result<()> {
            let frames = self.frames.clone();
            *self.worker.lock() = Some(thread::spawn(move || {
                for frame in frames {
                    thread::sleep(Duration::from_millis(20));
                    callback(Arc::new(frame));
                }
            }));
            Ok(())
        }

        fn stop(&self) -> contracts::Result<()> {
            if let Some(worker) = self.worker.lock().take() {
                let _ = worker.join();
            }
            Ok(())
        }
    }

    fn bgra_frame(ticks: u64, data: Vec<u8>) -> VideoFrame {
        VideoFrame {
            timestamp: RelativeTicks(ticks),
            intrinsics: CameraIntrinsics {
                fx: 2.0,
                fy: 2.0,
                ..CameraIntrinsics::default()
            },
            format: VideoPixelFormat::Bgra8,
            width: 4,
            height: 3,
            data,
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_arrivals_are_counted_without_grab_thread() {
        let (engine, source) = engine_with(MockVideoConfig::fast(), MockPoseLocator::new());
        engine.initialize().unwrap();
        engine.initialize().unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.arrived_frames() >= 3));
        assert_eq!(engine.converted_frames(), 0);
        assert_eq!(engine.size(), 0);
        engine.shutdown();
        assert!(!source.is_running());
    }

    #[test]
    fn test_copy_requires_presized_destination() {
        let (engine, _source) = engine_with(MockVideoConfig::fast(), MockPoseLocator::new());
        engine.initialize().unwrap();
        engine
            .start_recording(None, &MemoryArchiveFactory::new(), ReferenceFrame::new("world"))
            .unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.new_available()));
        assert_eq!(engine.size(), 4 * 3 * 4);
        assert_eq!((engine.width(), engine.height()), (4, 3));

        let mut wrong = LatestFrame::bgra_with_len(7);
        assert!(!engine.copy_last_frame(&mut wrong, false));
        assert!(engine.new_available());
        assert_eq!(engine.copied_to_client_frames(), 0);

        let mut dest = LatestFrame::bgra_with_len(engine.size());
        assert!(engine.copy_last_frame(&mut dest, false));
        assert_eq!(engine.copied_to_client_frames(), 1);
        assert_eq!(dest.intrinsics.unwrap().fx, 2.0);
        assert_eq!(dest.width, 4);
        assert!(dest.timestamp.0 > 0);
        engine.stop_recording();
        assert!(engine.converted_frames() >= 1);
        assert!(engine.copied_in_context_frames() >= 1);
    }

    #[test]
    fn test_rgba_is_converted_and_flipped() {
        let config = MockVideoConfig {
            format: VideoPixelFormat::Rgba8,
            ..MockVideoConfig::fast()
        };
        let (engine, _source) = engine_with(config, MockPoseLocator::new());
        engine.initialize().unwrap();
        engine
            .start_recording(None, &MemoryArchiveFactory::new(), ReferenceFrame::new("world"))
            .unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.size() > 0));
        engine.stop_recording();

        let mut dest = LatestFrame::bgra_with_len(engine.size());
        assert!(engine.copy_last_frame(&mut dest, true));
        let PixelBuffer::Bgra8(data) = &dest.pixels else {
            panic!("expected bgra pixels");
        };
        // source pixel is [row, index, 0x40, 0xff] in RGBA; first row after flip is row 2
        assert_eq!(data[0], 0x40);
        assert_eq!(data[2], 2);
        assert_eq!(data[3], 0xff);
    }

    #[test]
    fn test_pose_kept_when_tracking_lost() {
        let (engine, _source) = engine_with(MockVideoConfig::fast(), MockPoseLocator::lost());
        engine.initialize().unwrap();
        engine
            .start_recording(None, &MemoryArchiveFactory::new(), ReferenceFrame::new("world"))
            .unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.new_available()));
        engine.stop_recording();

        let mut dest = LatestFrame::bgra_with_len(engine.size());
        assert!(engine.copy_last_frame(&mut dest, false));
        assert_eq!(dest.pose, cv_camera_transform(&RigPose::identity()));
    }

    #[test]
    fn test_recording_archive_and_metadata_dump() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _source) = engine_with(MockVideoConfig::fast(), MockPoseLocator::new());
        let factory = MemoryArchiveFactory::new();
        let entries = factory.entries();

        engine.initialize().unwrap();
        engine.clear();
        engine
            .start_recording(Some(dir.path()), &factory, ReferenceFrame::new("world"))
            .unwrap();
        assert!(engine.is_recording());
        assert!(wait_until(Duration::from_secs(2), || engine.log_len() >= 3));
        engine.stop_recording();
        assert!(!engine.is_recording());

        let archive_path = dir.path().join("PV");
        let names = entries.names(&archive_path);
        assert_eq!(names.len(), engine.log_len());
        assert!(names.iter().all(|n| n.ends_with(".bytes")));
        assert_eq!(entries.get(&archive_path, &names[0]).unwrap().len(), 48);

        let path = engine.dump_data_to_disk(dir.path(), "2026-10-16-101500").unwrap();
        assert!(path.ends_with("2026-10-16-101500_pv.txt"));
        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "2,1.5,4,3");
        let first = lines.next().unwrap();
        assert_eq!(first.split(',').count(), 19);
        assert!(first.starts_with(&names[0].trim_end_matches(".bytes").to_string()));
        assert_eq!(lines.count() + 1, engine.log_len());

        engine.clear();
        assert_eq!(engine.log_len(), 0);
    }

    #[test]
    fn test_short_buffer_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource {
            frames: vec![bgra_frame(1_000, vec![1; 10]), bgra_frame(2_000, vec![2; 48])],
            worker: Mutex::new(None),
        });
        let engine = VideoStreamEngine::new(
            source,
            Arc::new(MockPoseLocator::new()),
            TimeConverter::with_offset(0),
            ReferenceFrame::new("world"),
            Duration::from_millis(5),
        );
        let factory = MemoryArchiveFactory::new();
        let entries = factory.entries();

        engine
            .start_recording(Some(dir.path()), &factory, ReferenceFrame::new("world"))
            .unwrap();
        engine.initialize().unwrap();
        assert!(wait_until(Duration::from_secs(2), || engine.log_len() == 1));
        thread::sleep(Duration::from_millis(50));
        engine.stop_recording();

        assert_eq!(engine.malformed_frames(), 1);
        assert_eq!(engine.converted_frames(), 1);
        assert_eq!(engine.size(), 4 * 3 * 4);
        assert_eq!(engine.size(), engine.width() as usize * engine.height() as usize * 4);
        assert_eq!(entries.names(&dir.path().join("PV")), vec!["2000.bytes".to_string()]);
        assert_eq!(engine.log_len(), 1);
    }
}
