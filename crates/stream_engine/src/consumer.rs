//! Frames handed to consumers.

use contracts::{AbsoluteTicks, CameraIntrinsics, PixelBuffer};

/// Snapshot returned by the latest-frame accessors.
///
/// `pose` is already laid out for the consumer; see [`crate::pose`].
#[derive(Debug, Clone, PartialEq)]
pub struct LatestFrame {
    pub timestamp: AbsoluteTicks,
    pub pose: [f32; 16],
    pub intrinsics: Option<CameraIntrinsics>,
    pub width: u32,
    pub height: u32,
    pub pixels: PixelBuffer,
}

impl LatestFrame {
    /// Pre-sized BGRA destination for [`crate::VideoStreamEngine::copy_last_frame`].
    pub fn bgra_with_len(len: usize) -> Self {
        Self {
            timestamp: AbsoluteTicks::default(),
            pose: [0.0; 16],
            intrinsics: None,
            width: 0,
            height: 0,
            pixels: PixelBuffer::Bgra8(vec![0; len]),
        }
    }

    pub fn pixel_buffer_size(&self) -> usize {
        self.pixels.byte_len()
    }

    /// `(depth, active_brightness)` planes of a depth frame.
    pub fn depth_planes(&self) -> Option<(&[u16], &[u16])> {
        match &self.pixels {
            PixelBuffer::Depth16(data) => Some(data.split_at(data.len() / 2)),
            _ => None,
        }
    }
}
