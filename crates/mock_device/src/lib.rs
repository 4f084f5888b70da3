//! # Mock Device
//!
//! Simulated collaborators for running the capture pipeline without hardware.
//!
//! - [`MockSensorDevice`]: research-mode sensors pulled at a fixed rate
//! - [`MockPoseLocator`]: deterministic rig trajectory with optional tracking loss
//! - [`MockVideoSource`]: color camera pushing frames from a background thread

mod clock;
mod locator;
mod sensor;
mod video;

pub use clock::MockClock;
pub use locator::MockPoseLocator;
pub use sensor::{MockDeviceConfig, MockSensorDevice, MockSensorHandle};
pub use video::{MockVideoConfig, MockVideoSource};
