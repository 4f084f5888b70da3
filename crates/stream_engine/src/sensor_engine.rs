//! SensorStreamEngine - 单传感器采集管线
//!
//! 每个引擎绑定一个传感器种类，拥有：
//! - 采集线程：等待授权 → 打开数据流 → 拉帧 → 定位 → 写入 [`FrameCache`]
//! - 写线程（仅在启动前设置了归档目录时创建）：门控后把最新帧写入归档
//!
//! 锁顺序固定为 storage → frame，任何锁都不跨越驱动调用。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    AbsoluteTicks, ArchiveFactory, ArchiveWriter, Consent, ConsentSignal, EngineConfig, FrameHeader,
    FrameKind, FrameRecord, PixelBuffer, PoseLocator, PoseSample, RawFrame, RawPixels,
    ReferenceFrame, Resolution, RigPose, SensorHandle, SensorKind,
};
use observability::DropReason;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::calibration;
use crate::consumer::LatestFrame;
use crate::depth::validated_planes;
use crate::error::{EngineError, Result};
use crate::frame_cache::FrameCache;
use crate::pose::consumer_transform;
use crate::raster::{encode_gray16, encode_gray8, flip_vertical_in_place};
use crate::time::TimeConverter;

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct SensorEngineConfig {
    /// 授权等待与写线程等待的取消检查间隔
    pub poll_interval: Duration,
    /// 连续瞬时拉帧错误的容忍次数
    pub transient_retry_limit: u32,
    /// 初始世界坐标系
    pub reference_frame: ReferenceFrame,
}

impl Default for SensorEngineConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SensorEngineConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            transient_retry_limit: config.transient_retry_limit,
            reference_frame: ReferenceFrame::new(config.reference_frame.as_str()),
        }
    }
}

/// 录制会话（归档目录 + 归档句柄 + 位姿日志）
#[derive(Default)]
struct Storage {
    folder: Option<PathBuf>,
    archive: Option<Box<dyn ArchiveWriter>>,
    pose_log: Vec<PoseSample>,
    last_persisted: Option<AbsoluteTicks>,
}

struct EngineShared {
    kind: SensorKind,
    name: String,
    handle: Box<dyn SensorHandle>,
    locator: Arc<dyn PoseLocator>,
    consent: ConsentSignal,
    converter: TimeConverter,
    config: SensorEngineConfig,
    world: RwLock<ReferenceFrame>,
    cache: FrameCache,
    storage: Mutex<Storage>,
    published: Mutex<u64>,
    frame_ready: Condvar,
    exit: AtomicBool,
    acquiring: AtomicBool,
    last_failure: Mutex<Option<String>>,
}

#[derive(Default)]
struct Threads {
    acquisition: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

/// 单传感器采集引擎
pub struct SensorStreamEngine {
    shared: Arc<EngineShared>,
    threads: Mutex<Threads>,
}

impl SensorStreamEngine {
    pub fn new(
        handle: Box<dyn SensorHandle>,
        locator: Arc<dyn PoseLocator>,
        consent: ConsentSignal,
        converter: TimeConverter,
        config: SensorEngineConfig,
    ) -> Self {
        let kind = handle.kind();
        let name = handle.friendly_name();
        let world = RwLock::new(config.reference_frame.clone());
        Self {
            shared: Arc::new(EngineShared {
                kind,
                name,
                handle,
                locator,
                consent,
                converter,
                config,
                world,
                cache: FrameCache::new(),
                storage: Mutex::new(Storage::default()),
                published: Mutex::new(0),
                frame_ready: Condvar::new(),
                exit: AtomicBool::new(false),
                acquiring: AtomicBool::new(false),
                last_failure: Mutex::new(None),
            }),
            threads: Mutex::new(Threads::default()),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.shared.kind
    }

    pub fn friendly_name(&self) -> &str {
        &self.shared.name
    }

    pub fn frame_kind(&self) -> FrameKind {
        self.shared.kind.frame_kind()
    }

    /// 启动采集线程（以及写线程，若已设置归档目录）
    ///
    /// 已在运行时返回 `false`，不创建任何线程。
    #[instrument(skip(self), fields(sensor = %self.shared.name))]
    pub fn start(&self) -> bool {
        let mut threads = self.threads.lock();
        if threads.acquisition.is_some() || threads.writer.is_some() {
            warn!("engine already running");
            return false;
        }

        self.shared.exit.store(false, Ordering::SeqCst);
        *self.shared.last_failure.lock() = None;

        let shared = Arc::clone(&self.shared);
        let acquisition = match thread::Builder::new()
            .name(format!("acq-{}", self.shared.name))
            .spawn(move || acquisition_loop(shared))
        {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "failed to spawn acquisition thread");
                return false;
            }
        };
        threads.acquisition = Some(acquisition);

        if self.shared.storage.lock().archive.is_some() {
            let shared = Arc::clone(&self.shared);
            match thread::Builder::new()
                .name(format!("writer-{}", self.shared.name))
                .spawn(move || writer_loop(shared))
            {
                Ok(handle) => threads.writer = Some(handle),
                Err(e) => error!(error = %e, "failed to spawn writer thread"),
            }
        }

        info!(writer = threads.writer.is_some(), "engine started");
        true
    }

    /// 通知退出并等待线程结束；未运行时为空操作
    #[instrument(skip(self), fields(sensor = %self.shared.name))]
    pub fn stop(&self) {
        let mut threads = self.threads.lock();
        if threads.acquisition.is_none() && threads.writer.is_none() {
            return;
        }

        self.shared.exit.store(true, Ordering::SeqCst);
        {
            let _published = self.shared.published.lock();
            self.shared.frame_ready.notify_all();
        }

        for (role, handle) in [
            ("acquisition", threads.acquisition.take()),
            ("writer", threads.writer.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!(thread = role, "thread panicked");
                }
            }
        }
        info!("engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.threads.lock().acquisition.is_some()
    }

    pub fn is_writer_running(&self) -> bool {
        self.threads.lock().writer.is_some()
    }

    /// 采集线程仍在拉帧
    pub fn is_acquiring(&self) -> bool {
        self.shared.acquiring.load(Ordering::SeqCst)
    }

    /// 最近一次采集线程异常退出的原因
    pub fn last_failure(&self) -> Option<String> {
        self.shared.last_failure.lock().clone()
    }

    pub fn set_world_frame(&self, world: ReferenceFrame) {
        *self.shared.world.write() = world;
    }

    pub fn world_frame(&self) -> ReferenceFrame {
        self.shared.world.read().clone()
    }

    /// 设置（或清除）归档目录
    ///
    /// 归档文件为 `<folder>/<friendly name>`，扩展名由工厂决定。已有归档会先关闭。
    #[instrument(skip(self, factory), fields(sensor = %self.shared.name))]
    pub fn set_storage_folder(&self, folder: Option<&Path>, factory: &dyn ArchiveFactory) -> Result<()> {
        let mut storage = self.shared.storage.lock();
        if let Some(mut previous) = storage.archive.take() {
            if let Err(e) = previous.close() {
                warn!(error = %e, "closing previous archive failed");
            }
        }
        storage.folder = None;
        storage.last_persisted = None;

        if let Some(folder) = folder {
            let archive = factory
                .create(&folder.join(&self.shared.name))
                .map_err(|e| EngineError::archive(&self.shared.name, e.to_string()))?;
            info!(archive = %archive.location().display(), "archive opened");
            storage.archive = Some(archive);
            storage.folder = Some(folder.to_path_buf());
            storage.pose_log.clear();
        }
        Ok(())
    }

    pub fn storage_folder(&self) -> Option<PathBuf> {
        self.shared.storage.lock().folder.clone()
    }

    pub fn pose_log_len(&self) -> usize {
        self.shared.storage.lock().pose_log.len()
    }

    /// 写出标定文件与位姿日志、清空日志并关闭归档
    ///
    /// 每一步都会执行；返回第一个错误。
    #[instrument(skip(self), fields(sensor = %self.shared.name))]
    pub fn finalize_storage(&self) -> Result<()> {
        let mut storage = self.shared.storage.lock();
        let mut first_error: Option<EngineError> = None;

        if let Some(folder) = storage.folder.clone() {
            let calibration = self
                .resolution()
                .and_then(|resolution| {
                    calibration::dump_calibration(self.shared.handle.as_ref(), resolution, &folder)
                });
            if let Err(e) = calibration {
                error!(error = %e, "calibration dump failed");
                first_error.get_or_insert(e);
            }

            match calibration::write_pose_log(&folder, &self.shared.name, &storage.pose_log) {
                Ok(path) => debug!(path = %path.display(), samples = storage.pose_log.len(), "pose log written"),
                Err(e) => {
                    error!(error = %e, "pose log dump failed");
                    first_error.get_or_insert(e.into());
                }
            }
        }
        storage.pose_log.clear();

        if let Some(mut archive) = storage.archive.take() {
            match archive.close() {
                Ok(()) => info!(archive = %archive.location().display(), "archive closed"),
                Err(e) => {
                    error!(error = %e, "archive close failed");
                    first_error.get_or_insert(EngineError::archive(&self.shared.name, e.to_string()));
                }
            }
        }
        storage.folder = None;
        storage.last_persisted = None;

        first_error.map_or(Ok(()), Err)
    }

    /// 分辨率：优先取缓存帧尺寸，否则查询驱动
    pub fn resolution(&self) -> Result<Resolution> {
        let cache = &self.shared.cache;
        let (width, height) = (cache.width(), cache.height());
        if width > 0 && height > 0 {
            return Ok(Resolution::new(width, height));
        }
        self.shared
            .handle
            .resolution()
            .map_err(|e| EngineError::driver(&self.shared.name, e))
    }

    pub fn is_new_available(&self) -> bool {
        self.shared.cache.is_new_available()
    }

    pub fn frame_cache(&self) -> &FrameCache {
        &self.shared.cache
    }

    /// 最新灰度帧；非灰度引擎返回 `TypeMismatch`，无新帧返回 `None`
    pub fn latest_grayscale(&self, flip: bool) -> Result<Option<LatestFrame>> {
        let actual = self.frame_kind();
        if actual != FrameKind::Grayscale {
            return Err(EngineError::type_mismatch(&self.shared.name, "grayscale", actual));
        }
        Ok(self.shared.cache.consume().map(|record| {
            let mut frame = into_latest(record);
            if flip {
                if let PixelBuffer::Gray8(data) = &mut frame.pixels {
                    flip_vertical_in_place(data, frame.width as usize);
                }
            }
            frame
        }))
    }

    /// 最新深度帧（深度平面 + 主动亮度平面）
    pub fn latest_depth(&self) -> Result<Option<LatestFrame>> {
        let actual = self.frame_kind();
        if !matches!(actual, FrameKind::Depth(_)) {
            return Err(EngineError::type_mismatch(&self.shared.name, "depth", actual));
        }
        Ok(self.shared.cache.consume().map(into_latest))
    }
}

impl Drop for SensorStreamEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn into_latest(record: FrameRecord) -> LatestFrame {
    LatestFrame {
        timestamp: record.header.timestamp,
        pose: consumer_transform(&record.header.pose),
        intrinsics: record.header.intrinsics,
        width: record.header.width,
        height: record.header.height,
        pixels: record.pixels,
    }
}

/// 打开的数据流，离开作用域时关闭
struct OpenStream<'a> {
    handle: &'a dyn SensorHandle,
}

impl Drop for OpenStream<'_> {
    fn drop(&mut self) {
        match self.handle.close_stream() {
            Ok(()) => debug!(sensor = %self.handle.friendly_name(), "stream closed"),
            Err(e) => warn!(sensor = %self.handle.friendly_name(), error = %e, "close stream failed"),
        }
    }
}

fn acquisition_loop(shared: Arc<EngineShared>) {
    shared.acquiring.store(true, Ordering::SeqCst);
    match run_acquisition(&shared) {
        Ok(()) => debug!(sensor = %shared.name, "acquisition loop exited"),
        Err(e) => {
            error!(sensor = %shared.name, error = %e, "acquisition aborted");
            *shared.last_failure.lock() = Some(e.to_string());
        }
    }
    shared.acquiring.store(false, Ordering::SeqCst);
}

/// `Ok(false)` when asked to exit before an answer arrived.
fn wait_for_consent(shared: &EngineShared) -> Result<bool> {
    loop {
        if shared.exit.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match shared.consent.wait_timeout(shared.config.poll_interval) {
            Some(Consent::Allowed) => return Ok(true),
            Some(consent) => {
                return Err(EngineError::ConsentDenied {
                    sensor: shared.name.clone(),
                    consent,
                })
            }
            None => trace!(sensor = %shared.name, "waiting for consent"),
        }
    }
}

fn run_acquisition(shared: &EngineShared) -> Result<()> {
    if !wait_for_consent(shared)? {
        return Ok(());
    }

    shared
        .handle
        .open_stream()
        .map_err(|e| EngineError::driver(&shared.name, e))?;
    let _stream = OpenStream {
        handle: shared.handle.as_ref(),
    };
    info!(sensor = %shared.name, "stream opened");

    let mut retries = 0;
    while !shared.exit.load(Ordering::SeqCst) {
        let raw = match shared.handle.next_frame() {
            Ok(raw) => {
                retries = 0;
                raw
            }
            Err(e) if e.is_transient() && retries < shared.config.transient_retry_limit => {
                retries += 1;
                warn!(sensor = %shared.name, error = %e, retries, "transient pull failure, retrying");
                continue;
            }
            Err(e) => return Err(EngineError::driver(&shared.name, e)),
        };
        accept_frame(shared, raw)?;
    }
    Ok(())
}

fn accept_frame(shared: &EngineShared, raw: RawFrame) -> Result<()> {
    observability::record_frame_acquired(shared.kind);

    let location = {
        let world = shared.world.read();
        shared.locator.locate(raw.timestamp, &world)
    };
    let Some(location) = location else {
        trace!(sensor = %shared.name, timestamp = raw.timestamp.0, "tracking lost, frame skipped");
        observability::record_frame_dropped(shared.kind, DropReason::TrackingLost);
        return Ok(());
    };

    let header = FrameHeader {
        timestamp: shared.converter.relative_to_absolute(raw.timestamp),
        pose: RigPose::from_location(&location),
        intrinsics: None,
        width: raw.resolution.width,
        height: raw.resolution.height,
    };
    let record = FrameRecord {
        header,
        pixels: decode_pixels(shared, raw.pixels)?,
    };
    if !record.is_consistent() {
        return Err(EngineError::driver(
            &shared.name,
            contracts::ContractError::driver(&shared.name, "buffer size does not match resolution"),
        ));
    }

    if shared.cache.publish(record) {
        observability::record_frame_published(shared.kind, header.timestamp);
        trace!(sensor = %shared.name, timestamp = header.timestamp.0, "frame published");
        let mut published = shared.published.lock();
        *published += 1;
        shared.frame_ready.notify_one();
    } else {
        observability::record_frame_dropped(shared.kind, DropReason::DuplicateTimestamp);
    }
    Ok(())
}

fn decode_pixels(shared: &EngineShared, pixels: RawPixels) -> Result<PixelBuffer> {
    match (shared.kind.frame_kind(), pixels) {
        (FrameKind::Grayscale, RawPixels::Grayscale(data)) => Ok(PixelBuffer::Gray8(data)),
        (FrameKind::Depth(mode), RawPixels::Depth(planes)) => validated_planes(mode, &planes)
            .map(PixelBuffer::Depth16)
            .ok_or_else(|| {
                EngineError::driver(
                    &shared.name,
                    contracts::ContractError::driver(&shared.name, "malformed depth planes"),
                )
            }),
        (expected, RawPixels::Grayscale(_)) => Err(EngineError::type_mismatch(
            &shared.name,
            "grayscale",
            expected,
        )),
        (expected, RawPixels::Depth(_)) => {
            Err(EngineError::type_mismatch(&shared.name, "depth", expected))
        }
    }
}

fn writer_loop(shared: Arc<EngineShared>) {
    debug!(sensor = %shared.name, "writer started");
    let mut seen = 0;
    loop {
        {
            let mut published = shared.published.lock();
            if *published == seen && !shared.exit.load(Ordering::SeqCst) {
                shared
                    .frame_ready
                    .wait_for(&mut published, shared.config.poll_interval);
            }
            seen = *published;
        }
        if shared.exit.load(Ordering::SeqCst) {
            break;
        }
        persist_latest(&shared);
    }
    debug!(sensor = %shared.name, "writer exited");
}

/// Appends the cached frame if its timestamp differs from the last one written.
///
/// A frame whose entries were only partly appended is not retried and gets no pose log line.
fn persist_latest(shared: &EngineShared) {
    let mut storage = shared.storage.lock();
    let Some(frame) = shared.cache.snapshot() else {
        return;
    };
    let timestamp = frame.timestamp();
    if storage.last_persisted == Some(timestamp) {
        return;
    }
    let Some(archive) = storage.archive.as_mut() else {
        return;
    };

    // a frame with any entry already appended is never retried, names must stay unique
    let mut appended = 0;
    let mut failure = None;
    for (name, data) in archive_entries(&frame) {
        match archive.add_entry(&name, &data) {
            Ok(()) => appended += 1,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if appended > 0 {
        storage.last_persisted = Some(timestamp);
    }

    match failure {
        None => {
            if storage
                .pose_log
                .last()
                .map_or(true, |last| last.timestamp < timestamp)
            {
                storage.pose_log.push(PoseSample {
                    timestamp,
                    pose: frame.header.pose,
                });
            }
            observability::record_frame_persisted(&shared.name);
            trace!(sensor = %shared.name, timestamp = timestamp.0, "frame persisted");
        }
        Some(e) => {
            error!(sensor = %shared.name, timestamp = timestamp.0, appended, error = %e, "archive append failed");
            observability::record_archive_write_failure(&shared.name);
        }
    }
}

/// Archive entries for one frame, named by absolute timestamp.
pub fn archive_entries(frame: &FrameRecord) -> Vec<(String, Bytes)> {
    let FrameHeader {
        timestamp,
        width,
        height,
        ..
    } = frame.header;
    match &frame.pixels {
        PixelBuffer::Gray8(data) => vec![(format!("{timestamp}.pgm"), encode_gray8(width, height, data))],
        PixelBuffer::Depth16(data) => {
            let (depth, active_brightness) = data.split_at(data.len() / 2);
            vec![
                (
                    format!("{timestamp}_ab.pgm"),
                    encode_gray16(width, height, active_brightness),
                ),
                (format!("{timestamp}.pgm"), encode_gray16(width, height, depth)),
            ]
        }
        PixelBuffer::Bgra8(data) => vec![(format!("{timestamp}.bytes"), Bytes::copy_from_slice(data))],
    }
}
