//! Sensor driver collaborator.
//!
//! [`SensorDevice`] enumerates and opens streams. Each opened stream is a
//! [`SensorHandle`] owned by exactly one engine.

use nalgebra::Matrix4;

use crate::{ConsentSignal, RelativeTicks, Resolution, Result, SensorDescriptor, SensorKind};

/// Depth frame planes as delivered by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthPlanes {
    pub depth: Vec<u16>,
    pub active_brightness: Vec<u16>,
    /// Per-pixel confidence byte, present in long-range mode only.
    pub sigma: Option<Vec<u8>>,
}

/// Pixel payload of a raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPixels {
    Grayscale(Vec<u8>),
    Depth(DepthPlanes),
}

/// Frame pulled from a sensor, before validation and pose attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub timestamp: RelativeTicks,
    pub resolution: Resolution,
    pub pixels: RawPixels,
}

/// Opened sensor stream.
pub trait SensorHandle: Send + Sync {
    fn kind(&self) -> SensorKind;

    /// Driver-reported name.
    fn friendly_name(&self) -> String {
        self.kind().friendly_name().to_string()
    }

    fn open_stream(&self) -> Result<()>;

    fn close_stream(&self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&self) -> Result<RawFrame>;

    fn resolution(&self) -> Result<Resolution>;

    /// Fixed sensor-to-rig transform, row-vector layout.
    fn extrinsics(&self) -> Result<Matrix4<f32>>;

    /// Map an image point onto the camera's unit plane.
    fn map_image_point_to_unit_plane(&self, uv: [f32; 2]) -> Option<[f32; 2]>;
}

/// Sensor enumeration, consent and stream opening.
pub trait SensorDevice: Send + Sync {
    fn enumerate(&self) -> Result<Vec<SensorDescriptor>>;

    fn open(&self, descriptor: &SensorDescriptor) -> Result<Box<dyn SensorHandle>>;

    /// Ask for camera access. The answer is latched into `signal` later, possibly from another thread.
    fn request_consent(&self, signal: ConsentSignal);

    /// Current value of the device-relative clock.
    fn clock_ticks(&self) -> RelativeTicks;
}
