//! SensorKind - 传感器种类
//!
//! 头戴设备上支持的物理/虚拟数据流。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 研究模式传感器种类
///
/// 每个 `SensorStreamEngine` 在构造时绑定一个种类，之后不再改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// 左前灰度跟踪相机
    LeftFront,
    /// 左侧灰度跟踪相机
    LeftLeft,
    /// 右前灰度跟踪相机
    RightFront,
    /// 右侧灰度跟踪相机
    RightRight,
    /// 深度相机 - 远距离模式
    DepthLongThrow,
    /// 深度相机 - 近距离高精度模式
    DepthAhat,
}

impl SensorKind {
    /// 全部种类
    pub const ALL: [SensorKind; 6] = [
        SensorKind::LeftFront,
        SensorKind::LeftLeft,
        SensorKind::RightFront,
        SensorKind::RightRight,
        SensorKind::DepthLongThrow,
        SensorKind::DepthAhat,
    ];

    /// 驱动报告的友好名称，用于归档与标定文件命名
    pub fn friendly_name(self) -> &'static str {
        match self {
            SensorKind::LeftFront => "VLC LF",
            SensorKind::LeftLeft => "VLC LL",
            SensorKind::RightFront => "VLC RF",
            SensorKind::RightRight => "VLC RR",
            SensorKind::DepthLongThrow => "Long Throw",
            SensorKind::DepthAhat => "AHAT",
        }
    }

    /// 该种类产生的帧类型
    pub fn frame_kind(self) -> FrameKind {
        match self {
            SensorKind::DepthLongThrow => FrameKind::Depth(DepthMode::LongRange),
            SensorKind::DepthAhat => FrameKind::Depth(DepthMode::ShortRange),
            _ => FrameKind::Grayscale,
        }
    }

    /// 是否为深度流
    pub fn is_depth(self) -> bool {
        matches!(self.frame_kind(), FrameKind::Depth(_))
    }

    /// 深度模式对应的传感器种类
    pub fn for_depth_mode(mode: DepthMode) -> Self {
        match mode {
            DepthMode::LongRange => SensorKind::DepthLongThrow,
            DepthMode::ShortRange => SensorKind::DepthAhat,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.friendly_name())
    }
}

/// 深度工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// 远距离模式：置信度字节的无效位决定有效性
    LongRange,
    /// 近距离模式：饱和阈值决定有效性
    ShortRange,
}

/// 帧类型（每个引擎构造时确定一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// 8 位灰度
    Grayscale,
    /// 16 位深度 + 16 位主动亮度
    Depth(DepthMode),
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Grayscale => f.write_str("grayscale"),
            FrameKind::Depth(DepthMode::LongRange) => f.write_str("depth (long range)"),
            FrameKind::Depth(DepthMode::ShortRange) => f.write_str("depth (short range)"),
        }
    }
}

/// 设备枚举出的传感器描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    /// 传感器种类
    pub kind: SensorKind,
}

/// 图像分辨率
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 像素数量
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
