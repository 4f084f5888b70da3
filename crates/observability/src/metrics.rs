//! 采集指标收集模块
//!
//! 帧计数器通过 `metrics` facade 上报（名称前缀 `hmd_capture_`），
//! 消费端帧间隔在内存中聚合，便于输出摘要。

use std::collections::BTreeMap;

use contracts::{AbsoluteTicks, SensorKind};
use metrics::{counter, gauge};

/// 帧被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 定位服务无法解析位姿
    TrackingLost,
    /// 时间戳与上一帧相同
    DuplicateTimestamp,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::TrackingLost => "tracking_lost",
            DropReason::DuplicateTimestamp => "duplicate_timestamp",
        }
    }
}

/// 视频引擎计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCounter {
    Arrived,
    Converted,
    CopiedInContext,
    CopiedToClient,
    /// 缓冲尺寸与宽高不符，被丢弃
    Malformed,
}

impl VideoCounter {
    fn metric_name(self) -> &'static str {
        match self {
            VideoCounter::Arrived => "hmd_capture_video_frames_arrived_total",
            VideoCounter::Converted => "hmd_capture_video_frames_converted_total",
            VideoCounter::CopiedInContext => "hmd_capture_video_frames_copied_in_context_total",
            VideoCounter::CopiedToClient => "hmd_capture_video_frames_copied_to_client_total",
            VideoCounter::Malformed => "hmd_capture_video_frames_malformed_total",
        }
    }
}

/// 记录从驱动拉取到一帧
pub fn record_frame_acquired(sensor: SensorKind) {
    counter!(
        "hmd_capture_frames_acquired_total",
        "sensor" => sensor.friendly_name()
    )
    .increment(1);
}

/// 记录一帧进入帧缓存
pub fn record_frame_published(sensor: SensorKind, timestamp: AbsoluteTicks) {
    counter!(
        "hmd_capture_frames_published_total",
        "sensor" => sensor.friendly_name()
    )
    .increment(1);
    gauge!(
        "hmd_capture_last_timestamp",
        "sensor" => sensor.friendly_name()
    )
    .set(timestamp.0 as f64);
}

/// 记录丢帧
pub fn record_frame_dropped(sensor: SensorKind, reason: DropReason) {
    counter!(
        "hmd_capture_frames_dropped_total",
        "sensor" => sensor.friendly_name(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// 记录一帧写入归档
pub fn record_frame_persisted(sensor: &str) {
    counter!(
        "hmd_capture_frames_persisted_total",
        "sensor" => sensor.to_string()
    )
    .increment(1);
}

/// 记录归档写入失败
pub fn record_archive_write_failure(sensor: &str) {
    counter!(
        "hmd_capture_archive_write_failures_total",
        "sensor" => sensor.to_string()
    )
    .increment(1);
}

/// 记录视频帧计数
pub fn record_video_frame(kind: VideoCounter) {
    counter!(kind.metric_name()).increment(1);
}

/// 消费端帧统计聚合器
///
/// 按数据流记录拉取到的帧数与相邻帧的时间间隔 (ms)。
#[derive(Debug, Clone, Default)]
pub struct CaptureMetricsAggregator {
    streams: BTreeMap<String, StreamStats>,
}

#[derive(Debug, Clone, Default)]
struct StreamStats {
    frames: u64,
    regressions: u64,
    last: Option<AbsoluteTicks>,
    interval_ms: RunningStats,
}

impl CaptureMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录消费端拉取到的一帧
    pub fn observe(&mut self, stream: &str, timestamp: AbsoluteTicks) {
        let stats = self.streams.entry(stream.to_string()).or_default();
        stats.frames += 1;
        if let Some(prev) = stats.last {
            if timestamp > prev {
                stats
                    .interval_ms
                    .push((timestamp.0 - prev.0) as f64 / 10_000.0);
            } else {
                stats.regressions += 1;
            }
        }
        stats.last = Some(timestamp);
    }

    /// 某数据流已拉取的帧数
    pub fn frames(&self, stream: &str) -> u64 {
        self.streams.get(stream).map_or(0, |s| s.frames)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            streams: self
                .streams
                .iter()
                .map(|(name, stats)| {
                    (
                        name.clone(),
                        StreamSummary {
                            frames: stats.frames,
                            regressions: stats.regressions,
                            interval_ms: StatsSummary::from(&stats.interval_ms),
                        },
                    )
                })
                .collect(),
        }
    }

}

/// 单个数据流的摘要
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub frames: u64,
    /// 时间戳未递增的次数
    pub regressions: u64,
    pub interval_ms: StatsSummary,
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub streams: BTreeMap<String, StreamSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        if self.streams.is_empty() {
            return writeln!(f, "No frames consumed");
        }
        for (name, stream) in &self.streams {
            writeln!(
                f,
                "{name}: {} frames, interval (ms): {}",
                stream.frames, stream.interval_ms
            )?;
            if stream.regressions > 0 {
                writeln!(f, "  non-increasing timestamps: {}", stream.regressions)?;
            }
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
