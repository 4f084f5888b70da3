//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 模拟设备上的端到端录制（无需真实硬件）
//! - 归档与标定文件格式回读
//! - 跨 crate 的生命周期约束

#[cfg(test)]
mod support {
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::Read;
    use std::path::Path;
    use std::sync::Arc;

    use archive::TarArchiveFactory;
    use contracts::ArchiveFactory;
    use mock_device::{
        MockDeviceConfig, MockPoseLocator, MockSensorDevice, MockVideoConfig, MockVideoSource,
    };
    use scenario::{CaptureDevices, RecordingController};
    use stream_engine::SensorEngineConfig;

    pub fn devices(config: MockDeviceConfig) -> CaptureDevices {
        let device = MockSensorDevice::new(config);
        let video = MockVideoSource::new(MockVideoConfig::fast(), device.clock().clone());
        CaptureDevices {
            sensors: Arc::new(device),
            locator: Arc::new(MockPoseLocator::new()),
            video: Some(Arc::new(video)),
        }
    }

    pub fn controller(root: &Path, factory: Arc<dyn ArchiveFactory>) -> RecordingController {
        let config = SensorEngineConfig {
            poll_interval: std::time::Duration::from_millis(5),
            ..SensorEngineConfig::default()
        };
        RecordingController::new(devices(MockDeviceConfig::fast()), factory, config, root)
    }

    pub fn tar_controller(root: &Path) -> RecordingController {
        controller(root, Arc::new(TarArchiveFactory))
    }

    /// Entries of a tar file in write order.
    pub fn read_tar(path: &Path) -> Vec<(String, Vec<u8>)> {
        let file = File::open(path).unwrap();
        let mut archive = tar::Archive::new(file);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (name, data)
            })
            .collect()
    }

    /// Leading timestamp of an entry name (`123.pgm`, `123_ab.pgm`, `123.bytes`).
    pub fn entry_timestamp(name: &str) -> u64 {
        let stem = name.split('.').next().unwrap();
        stem.trim_end_matches("_ab").parse().unwrap()
    }

    pub fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn group_by_timestamp(entries: &[(String, Vec<u8>)]) -> BTreeMap<u64, Vec<String>> {
        let mut groups: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for (name, _) in entries {
            groups.entry(entry_timestamp(name)).or_default().push(name.clone());
        }
        groups
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::thread;
    use std::time::Duration;

    use contracts::{ReferenceFrame, SensorKind};
    use scenario::{StreamKind, SESSION_FOLDER};
    use stream_engine::raster::decode_pgm;
    use stream_engine::{absolute_ticks_of, LatestFrame};

    use super::support::*;

    /// End-to-end: mock device -> engines -> tar archives -> session folder
    ///
    /// 验证完整的录制流程：
    /// 1. 灰度、深度与彩色三类数据流同时运行
    /// 2. 停止后会话目录被重命名为时间戳
    /// 3. 每个归档、标定文件与位姿日志的格式可以回读
    #[test]
    fn test_e2e_tar_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = tar_controller(dir.path());
        assert!(controller.enable_grayscale(SensorKind::LeftFront));
        assert!(controller.enable_depth(contracts::DepthMode::LongRange));
        assert!(controller.enable_video());
        assert!(controller.enable_recording());
        controller.initialize_sensors().unwrap();

        assert!(controller.start(ReferenceFrame::new("world")).unwrap());
        assert!(controller.is_running());
        assert!(dir.path().join(SESSION_FOLDER).is_dir());
        assert!(!controller.disable_recording());

        thread::sleep(Duration::from_millis(400));
        assert!(controller.stop().unwrap());
        assert!(!controller.is_running());

        let session = controller.last_session().unwrap().to_path_buf();
        assert!(!dir.path().join(SESSION_FOLDER).exists());
        let datetime = session.file_name().unwrap().to_string_lossy().into_owned();

        // Grayscale archive
        let gray = read_tar(&session.join("VLC LF.tar"));
        assert!(!gray.is_empty());
        let mut previous = 0;
        for (name, data) in &gray {
            assert!(name.ends_with(".pgm"));
            let ts = entry_timestamp(name);
            assert!(ts > previous, "entries must be strictly increasing");
            previous = ts;
            let pgm = decode_pgm(data).unwrap();
            assert_eq!((pgm.width, pgm.height, pgm.max_value), (8, 6, 255));
        }
        let gray_poses = lines(&session.join("VLC LF_rig2world.txt"));
        assert_eq!(gray_poses.len(), gray.len());
        for (line, (name, _)) in gray_poses.iter().zip(&gray) {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 17);
            assert_eq!(fields[0].parse::<u64>().unwrap(), entry_timestamp(name));
        }

        // Depth archive: `_ab` entry first, then depth
        let depth = read_tar(&session.join("Long Throw.tar"));
        assert!(!depth.is_empty());
        assert_eq!(depth.len() % 2, 0);
        for pair in depth.chunks(2) {
            let ts = entry_timestamp(&pair[0].0);
            assert_eq!(pair[0].0, format!("{ts}_ab.pgm"));
            assert_eq!(pair[1].0, format!("{ts}.pgm"));
            let pgm = decode_pgm(&pair[1].1).unwrap();
            assert_eq!((pgm.width, pgm.height, pgm.max_value), (6, 4, 65535));
        }
        let groups = group_by_timestamp(&depth);
        assert!(groups.values().all(|names| names.len() == 2));
        assert_eq!(lines(&session.join("Long Throw_rig2world.txt")).len(), groups.len());

        // Calibration dumps
        for name in ["VLC LF", "Long Throw"] {
            let extrinsics = lines(&session.join(format!("{name}_extrinsics.txt")));
            assert_eq!(extrinsics.len(), 1);
            assert_eq!(extrinsics[0].split(',').count(), 16);
        }
        let lut = std::fs::read(session.join("VLC LF_lut.bin")).unwrap();
        assert_eq!(lut.len(), 8 * 6 * 3 * 4);
        let lut = std::fs::read(session.join("Long Throw_lut.bin")).unwrap();
        assert_eq!(lut.len(), 6 * 4 * 3 * 4);

        // Video archive and metadata
        let video = read_tar(&session.join("PV.tar"));
        assert!(!video.is_empty());
        assert!(video
            .iter()
            .all(|(name, data)| name.ends_with(".bytes") && data.len() == 4 * 3 * 4));
        let metadata = lines(&session.join(format!("{datetime}_pv.txt")));
        assert_eq!(metadata[0].split(',').count(), 4);
        assert_eq!(metadata.len(), video.len() + 1);
        for line in &metadata[1..] {
            assert_eq!(line.split(',').count(), 19);
        }
    }

    #[test]
    fn test_timestamps_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = tar_controller(dir.path());
        controller.enable_grayscale(SensorKind::RightRight);
        controller.initialize_sensors().unwrap();
        controller.start(ReferenceFrame::new("world")).unwrap();

        let now = absolute_ticks_of(chrono::Utc::now()) as u64;
        let mut frame: Option<LatestFrame> = None;
        for _ in 0..200 {
            frame = controller.latest_grayscale(SensorKind::RightRight, false).unwrap();
            if frame.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        controller.stop().unwrap();

        let frame = frame.expect("no frame within one second");
        let minute = 60 * 10_000_000;
        assert!(frame.timestamp.0.abs_diff(now) < minute);
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(controller.width(StreamKind::Sensor(SensorKind::RightRight)), 8);
    }

    #[test]
    fn test_both_depth_modes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = tar_controller(dir.path());
        controller.enable_depth(contracts::DepthMode::LongRange);
        controller.enable_depth(contracts::DepthMode::ShortRange);

        let err = controller.initialize_sensors().unwrap_err();
        assert!(err.is_configuration());
        assert!(controller.scenario().is_none());
    }

    #[test]
    fn test_consumer_reads_without_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = tar_controller(dir.path());
        controller.enable_depth(contracts::DepthMode::ShortRange);
        controller.enable_video();
        controller.initialize_sensors().unwrap();
        controller.start(ReferenceFrame::new("world")).unwrap();

        let mut depth = None;
        let mut video = None;
        for _ in 0..200 {
            depth = depth.or(controller.latest_depth().unwrap());
            video = video.or(controller.latest_video(true).unwrap());
            if depth.is_some() && video.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        controller.stop().unwrap();

        let depth = depth.unwrap();
        let (values, active_brightness) = depth.depth_planes().unwrap();
        assert_eq!(values.len(), 6 * 4);
        assert_eq!(active_brightness.len(), 6 * 4);
        assert!(values.iter().all(|&d| d < stream_engine::depth::AHAT_INVALID_VALUE));

        let video = video.unwrap();
        assert_eq!((video.width, video.height), (4, 3));
        assert!(video.intrinsics.is_some());

        assert!(controller.last_session().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use archive::MemoryArchiveFactory;
    use contracts::{ReferenceFrame, SensorKind};
    use mock_device::{MockDeviceConfig, MockPoseLocator, MockSensorDevice};
    use scenario::{ScenarioError, StreamScenario};
    use stream_engine::SensorEngineConfig;

    fn new_scenario(factory: Arc<MemoryArchiveFactory>) -> StreamScenario {
        StreamScenario::new(
            Arc::new(MockSensorDevice::new(MockDeviceConfig::fast())),
            Arc::new(MockPoseLocator::new()),
            factory,
            SensorEngineConfig::default(),
        )
    }

    /// 无归档目录时不启动写线程；设置目录后重新启动则启动写线程
    #[test]
    fn test_writer_thread_follows_archive_destination() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(MemoryArchiveFactory::new());
        let mut scenario = new_scenario(Arc::clone(&factory));
        scenario
            .initialize_sensors(&BTreeSet::from([SensorKind::LeftLeft]))
            .unwrap();
        let world = ReferenceFrame::new("world");

        scenario.start_recording(None, world.clone()).unwrap();
        let engine = scenario.engine(SensorKind::LeftLeft).unwrap();
        assert!(engine.is_running());
        assert!(!engine.is_writer_running());
        scenario.stop_recording().unwrap();
        assert!(!engine.is_running());

        scenario.start_recording(Some(dir.path()), world).unwrap();
        let engine = scenario.engine(SensorKind::LeftLeft).unwrap();
        assert!(engine.is_writer_running());
        thread::sleep(Duration::from_millis(100));
        scenario.stop_recording().unwrap();

        let archive = dir.path().join("VLC LL");
        assert!(!factory.entries().names(&archive).is_empty());
        assert!(dir.path().join("VLC LL_rig2world.txt").exists());
    }

    #[test]
    fn test_stop_is_idempotent_across_layers() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = super::support::tar_controller(dir.path());
        assert!(!controller.stop().unwrap());

        controller.enable_grayscale(SensorKind::LeftFront);
        controller.initialize_sensors().unwrap();
        assert!(controller.start(ReferenceFrame::new("world")).unwrap());
        assert!(!controller.start(ReferenceFrame::new("world")).unwrap());
        assert!(controller.stop().unwrap());
        assert!(!controller.stop().unwrap());
    }

    #[test]
    fn test_unregistered_sensor_is_a_configuration_error() {
        let mut scenario = new_scenario(Arc::new(MemoryArchiveFactory::new()));
        scenario
            .initialize_sensors(&BTreeSet::from([SensorKind::RightFront]))
            .unwrap();

        let err = scenario.engine(SensorKind::LeftFront).err().unwrap();
        assert!(matches!(
            err,
            ScenarioError::UnregisteredSensor {
                sensor: SensorKind::LeftFront
            }
        ));
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use contracts::{ContainerKind, ReferenceFrame, SensorKind};
    use scenario::RecordingController;

    use super::support::devices;

    const CONFIG: &str = r#"
[streams]
sensors = ["left_front", "depth_ahat"]
video = false

[recording]
enabled = true
container = "directory"

[engine]
consent_poll_ms = 5
reference_frame = "world"
"#;

    /// 配置文件驱动的录制：TOML -> CaptureBlueprint -> RecordingController
    #[tokio::test]
    async fn test_blueprint_driven_directory_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        blueprint.recording.root = dir.path().to_path_buf();
        assert_eq!(blueprint.recording.container, ContainerKind::Directory);

        let factory = archive::factory_for(blueprint.recording.container);
        let world = ReferenceFrame::new(&blueprint.engine.reference_frame);
        let mut controller = RecordingController::from_blueprint(
            &blueprint,
            devices(mock_device::MockDeviceConfig::fast()),
            Arc::clone(&factory),
        );

        let session = tokio::task::spawn_blocking(move || {
            controller.initialize_sensors().unwrap();
            controller.start(world).unwrap();
            thread::sleep(Duration::from_millis(200));
            controller.stop().unwrap();
            controller.last_session().map(|p| p.to_path_buf())
        })
        .await
        .unwrap()
        .unwrap();

        let gray_dir = session.join(SensorKind::LeftFront.friendly_name());
        assert!(gray_dir.is_dir());
        assert!(std::fs::read_dir(&gray_dir).unwrap().count() > 0);
        let depth_dir = session.join(SensorKind::DepthAhat.friendly_name());
        let names: Vec<String> = std::fs::read_dir(&depth_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("_ab.pgm")));
        assert!(session.join("AHAT_lut.bin").exists());
    }

    #[test]
    fn test_invalid_blueprint_rejected_before_capture() {
        let err = config_loader::ConfigLoader::load_from_str(
            "[streams]\nsensors = [\"depth_ahat\", \"depth_long_throw\"]\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }
}
