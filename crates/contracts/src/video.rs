//! Color video collaborator.

use std::sync::Arc;

use crate::{RelativeTicks, Result};

/// Pixel layout of an arrived video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoPixelFormat {
    Bgra8,
    Rgba8,
    Gray8,
}

impl VideoPixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            VideoPixelFormat::Bgra8 | VideoPixelFormat::Rgba8 => 4,
            VideoPixelFormat::Gray8 => 1,
        }
    }
}

/// Pinhole intrinsics of the video camera.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

/// One arrived video frame, not yet converted.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub timestamp: RelativeTicks,
    pub intrinsics: CameraIntrinsics,
    pub format: VideoPixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Arrival callback. May run on any thread owned by the source.
pub type VideoFrameCallback = Arc<dyn Fn(Arc<VideoFrame>) + Send + Sync>;

/// Event-driven frame source.
pub trait VideoFrameSource: Send + Sync {
    fn start(&self, callback: VideoFrameCallback) -> Result<()>;

    fn stop(&self) -> Result<()>;
}
