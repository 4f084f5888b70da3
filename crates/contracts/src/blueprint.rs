//! CaptureBlueprint - Config Loader 输出
//!
//! 描述一次采集会话：启用哪些数据流、是否录制、录制容器格式以及引擎调优参数。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::SensorKind;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 启用的数据流
    pub streams: StreamsConfig,

    /// 录制设置
    #[serde(default)]
    pub recording: RecordingConfig,

    /// 引擎调优参数
    #[serde(default)]
    pub engine: EngineConfig,
}

/// 数据流配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// 研究模式传感器列表
    #[serde(default)]
    pub sensors: Vec<SensorKind>,

    /// 是否启用彩色视频流
    #[serde(default)]
    pub video: bool,
}

/// 录制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// 是否录制
    #[serde(default)]
    pub enabled: bool,

    /// 归档根目录
    #[serde(default = "default_recording_root")]
    pub root: PathBuf,

    /// 归档容器格式
    #[serde(default)]
    pub container: ContainerKind,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: default_recording_root(),
            container: ContainerKind::default(),
        }
    }
}

fn default_recording_root() -> PathBuf {
    PathBuf::from("./captures")
}

/// 归档容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// 单个 tar 文件
    #[default]
    Tar,
    /// 目录，每个条目一个文件
    Directory,
}

/// 引擎调优参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 等待授权与写线程等待的取消检查间隔 (ms)，必须 > 0
    #[serde(default = "default_consent_poll_ms")]
    pub consent_poll_ms: u64,

    /// 瞬时拉帧错误可容忍的重试次数
    #[serde(default = "default_transient_retry_limit")]
    pub transient_retry_limit: u32,

    /// 世界参考坐标系名称
    #[serde(default = "default_reference_frame")]
    pub reference_frame: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consent_poll_ms: default_consent_poll_ms(),
            transient_retry_limit: default_transient_retry_limit(),
            reference_frame: default_reference_frame(),
        }
    }
}

fn default_consent_poll_ms() -> u64 {
    50
}

fn default_transient_retry_limit() -> u32 {
    1
}

fn default_reference_frame() -> String {
    "world".to_string()
}

impl EngineConfig {
    /// 取消检查间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.consent_poll_ms)
    }
}

impl CaptureBlueprint {
    /// 启用的灰度跟踪相机
    pub fn grayscale_sensors(&self) -> impl Iterator<Item = SensorKind> + '_ {
        self.streams
            .sensors
            .iter()
            .copied()
            .filter(|kind| !kind.is_depth())
    }

    /// 启用的深度流（若同时启用两种模式，返回第一个）
    pub fn depth_sensor(&self) -> Option<SensorKind> {
        self.streams.sensors.iter().copied().find(|k| k.is_depth())
    }

    /// 至少启用了一个数据流
    pub fn has_any_stream(&self) -> bool {
        !self.streams.sensors.is_empty() || self.streams.video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let json = r#"{ "streams": { "sensors": ["left_front"] } }"#;
        let blueprint: CaptureBlueprint = serde_json::from_str(json).unwrap();

        assert!(!blueprint.recording.enabled);
        assert_eq!(blueprint.recording.container, ContainerKind::Tar);
        assert_eq!(blueprint.engine.consent_poll_ms, 50);
        assert_eq!(blueprint.engine.transient_retry_limit, 1);
        assert_eq!(blueprint.engine.reference_frame, "world");
        assert!(!blueprint.streams.video);
    }

    #[test]
    fn test_stream_helpers() {
        let blueprint = CaptureBlueprint {
            streams: StreamsConfig {
                sensors: vec![
                    SensorKind::LeftFront,
                    SensorKind::DepthAhat,
                    SensorKind::RightRight,
                ],
                video: false,
            },
            ..Default::default()
        };

        let gray: Vec<_> = blueprint.grayscale_sensors().collect();
        assert_eq!(gray, vec![SensorKind::LeftFront, SensorKind::RightRight]);
        assert_eq!(blueprint.depth_sensor(), Some(SensorKind::DepthAhat));
        assert!(blueprint.has_any_stream());
        assert!(!CaptureBlueprint::default().has_any_stream());
    }
}
