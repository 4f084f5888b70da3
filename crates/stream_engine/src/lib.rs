//! # Stream Engine
//!
//! Per-sensor capture pipelines.
//!
//! - [`SensorStreamEngine`]: pull loop for research-mode sensors (grayscale, depth)
//! - [`VideoStreamEngine`]: event-driven color camera
//! - [`FrameCache`]: latest-frame-wins slot shared by both
//!
//! Timestamps reach consumers as [`contracts::AbsoluteTicks`] via [`TimeConverter`].

pub mod calibration;
mod consumer;
pub mod depth;
mod error;
mod frame_cache;
pub mod pose;
pub mod raster;
mod sensor_engine;
mod time;
mod video_engine;

pub use consumer::LatestFrame;
pub use error::{EngineError, Result};
pub use frame_cache::FrameCache;
pub use sensor_engine::{archive_entries, SensorEngineConfig, SensorStreamEngine};
pub use time::{absolute_ticks_of, TimeConverter};
pub use video_engine::{VideoLogEntry, VideoStreamEngine};
