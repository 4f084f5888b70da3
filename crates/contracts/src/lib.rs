//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every sensor reports time as [`RelativeTicks`] (100ns units, device-relative clock)
//! - Cached and persisted frames carry [`AbsoluteTicks`] (100ns units since 1601-01-01 UTC)
//!
//! ## Collaborators
//! Hardware, spatial tracking and archive containers live behind the traits
//! [`SensorDevice`], [`PoseLocator`], [`ArchiveFactory`] and [`VideoFrameSource`].

mod archive;
mod blueprint;
mod consent;
mod device;
mod error;
mod frame;
mod locator;
mod pose;
mod reference_frame;
mod sensor;
mod time;
mod video;

pub use archive::{ArchiveFactory, ArchiveWriter};
pub use blueprint::*;
pub use consent::{Consent, ConsentSignal};
pub use device::{DepthPlanes, RawFrame, RawPixels, SensorDevice, SensorHandle};
pub use error::*;
pub use frame::*;
pub use locator::{PoseLocator, SpatialLocation};
pub use pose::{PoseSample, RigPose};
pub use reference_frame::ReferenceFrame;
pub use sensor::*;
pub use time::{AbsoluteTicks, RelativeTicks};
pub use video::{
    CameraIntrinsics, VideoFrame, VideoFrameCallback, VideoFrameSource, VideoPixelFormat,
};
