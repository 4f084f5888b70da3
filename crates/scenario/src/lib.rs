//! # Scenario
//!
//! Session orchestration on top of the stream engines.
//!
//! Responsibilities:
//! - Enumerate sensors, request consent once, register one engine per enabled sensor
//! - Reject enabling both depth modes
//! - Fan out start/stop recording to every engine
//! - Top-level Start/Stop sequencing and session folder naming ([`RecordingController`])

pub mod controller;
pub mod error;
pub mod scenario;

pub use controller::{CaptureDevices, RecordingController, StreamKind, SESSION_FOLDER};
pub use error::{Result, ScenarioError};
pub use scenario::StreamScenario;
