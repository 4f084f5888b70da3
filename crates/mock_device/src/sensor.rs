//! Mock research-mode sensors
//!
//! Each opened handle produces frames on demand: `next_frame` sleeps until the
//! next frame period, which mirrors the blocking pull of a real driver.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use contracts::{
    Consent, ConsentSignal, ContractError, DepthPlanes, RawFrame, RawPixels, RelativeTicks,
    Resolution, Result, SensorDescriptor, SensorDevice, SensorHandle, SensorKind,
};
use nalgebra::Matrix4;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::MockClock;

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    /// Frame rate of every sensor (Hz)
    pub frequency_hz: f64,
    /// Sensors reported by `enumerate`
    pub sensors: Vec<SensorKind>,
    /// Grayscale camera resolution
    pub grayscale_resolution: Resolution,
    /// Long-range depth resolution
    pub long_throw_resolution: Resolution,
    /// Short-range depth resolution
    pub ahat_resolution: Resolution,
    /// Answer given to consent requests
    pub consent: Consent,
    /// Delay before the consent answer arrives
    pub consent_delay: Duration,
    /// Sensors whose `open` fails
    pub failing_open: HashSet<SensorKind>,
    /// Number of transient failures each handle reports before its first frame
    pub transient_failures: u32,
    /// Hard driver failure after this many frames
    pub fail_after_frames: Option<u64>,
    /// Emit every timestamp twice
    pub duplicate_timestamps: bool,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 30.0,
            sensors: SensorKind::ALL.to_vec(),
            grayscale_resolution: Resolution::new(640, 480),
            long_throw_resolution: Resolution::new(320, 288),
            ahat_resolution: Resolution::new(512, 512),
            consent: Consent::Allowed,
            consent_delay: Duration::from_millis(10),
            failing_open: HashSet::new(),
            transient_failures: 0,
            fail_after_frames: None,
            duplicate_timestamps: false,
        }
    }
}

impl MockDeviceConfig {
    /// Small frames at a high rate, for tests.
    pub fn fast() -> Self {
        Self {
            frequency_hz: 200.0,
            grayscale_resolution: Resolution::new(8, 6),
            long_throw_resolution: Resolution::new(6, 4),
            ahat_resolution: Resolution::new(6, 4),
            consent_delay: Duration::from_millis(1),
            ..Self::default()
        }
    }

    fn resolution_for(&self, kind: SensorKind) -> Resolution {
        match kind {
            SensorKind::DepthLongThrow => self.long_throw_resolution,
            SensorKind::DepthAhat => self.ahat_resolution,
            _ => self.grayscale_resolution,
        }
    }
}

/// Simulated sensor device
pub struct MockSensorDevice {
    config: MockDeviceConfig,
    clock: MockClock,
    consent_requests: AtomicU32,
}

impl MockSensorDevice {
    pub fn new(config: MockDeviceConfig) -> Self {
        Self {
            config,
            clock: MockClock::default(),
            consent_requests: AtomicU32::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MockDeviceConfig::default())
    }

    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    /// Number of consent requests received so far
    pub fn consent_requests(&self) -> u32 {
        self.consent_requests.load(Ordering::Relaxed)
    }
}

impl SensorDevice for MockSensorDevice {
    fn enumerate(&self) -> Result<Vec<SensorDescriptor>> {
        Ok(self
            .config
            .sensors
            .iter()
            .map(|&kind| SensorDescriptor { kind })
            .collect())
    }

    fn open(&self, descriptor: &SensorDescriptor) -> Result<Box<dyn SensorHandle>> {
        let kind = descriptor.kind;
        if !self.config.sensors.contains(&kind) {
            return Err(ContractError::SensorNotFound {
                sensor: kind.friendly_name().to_string(),
            });
        }
        if self.config.failing_open.contains(&kind) {
            return Err(ContractError::driver(kind.friendly_name(), "open failed"));
        }
        debug!(sensor = %kind, "mock sensor opened");
        Ok(Box::new(MockSensorHandle::new(
            kind,
            self.config.clone(),
            self.clock.clone(),
        )))
    }

    fn request_consent(&self, signal: ConsentSignal) {
        self.consent_requests.fetch_add(1, Ordering::Relaxed);
        let consent = self.config.consent;
        let delay = self.config.consent_delay;
        thread::spawn(move || {
            thread::sleep(delay);
            signal.grant(consent);
            debug!(consent = %consent, "mock consent answered");
        });
    }

    fn clock_ticks(&self) -> RelativeTicks {
        self.clock.now()
    }
}

/// Opened mock stream
pub struct MockSensorHandle {
    kind: SensorKind,
    config: MockDeviceConfig,
    clock: MockClock,
    streaming: AtomicBool,
    frames: AtomicU64,
    transient_left: AtomicU32,
    last: Mutex<Option<(Instant, RelativeTicks)>>,
}

impl MockSensorHandle {
    pub fn new(kind: SensorKind, config: MockDeviceConfig, clock: MockClock) -> Self {
        let transient_left = AtomicU32::new(config.transient_failures);
        Self {
            kind,
            config,
            clock,
            streaming: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            transient_left,
            last: Mutex::new(None),
        }
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.frequency_hz.max(1.0))
    }

    /// Sleep to the next frame slot and pick its timestamp.
    fn wait_for_slot(&self, index: u64) -> RelativeTicks {
        let mut last = self.last.lock();
        if let Some((at, _)) = *last {
            let next = at + self.period();
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            }
        }

        let repeat = self.config.duplicate_timestamps && index % 2 == 1;
        let timestamp = match *last {
            Some((_, prev)) if repeat => prev,
            Some((_, prev)) => RelativeTicks(self.clock.now().0.max(prev.0 + 1)),
            None => self.clock.now(),
        };
        *last = Some((Instant::now(), timestamp));
        timestamp
    }

    fn generate_pixels(&self, resolution: Resolution, index: u64) -> RawPixels {
        let width = resolution.width as usize;
        let count = resolution.pixel_count();
        match self.kind {
            SensorKind::DepthLongThrow => {
                let depth = (0..count)
                    .map(|i| (500 + (i % width) * 10 + index as usize % 7) as u16)
                    .collect();
                let active_brightness = (0..count).map(|i| (i * 3) as u16).collect();
                let sigma = (0..count)
                    .map(|i| if i % 7 == 3 { 0x80 } else { 0x00 })
                    .collect();
                RawPixels::Depth(DepthPlanes {
                    depth,
                    active_brightness,
                    sigma: Some(sigma),
                })
            }
            SensorKind::DepthAhat => {
                let depth = (0..count)
                    .map(|i| if i % 5 == 4 { 4090 } else { (200 + i) as u16 })
                    .collect();
                let active_brightness = (0..count).map(|i| (i * 2) as u16).collect();
                RawPixels::Depth(DepthPlanes {
                    depth,
                    active_brightness,
                    sigma: None,
                })
            }
            _ => RawPixels::Grayscale(
                (0..count)
                    .map(|i| ((i / width) as u64 * 16 + index) as u8)
                    .collect(),
            ),
        }
    }
}

impl SensorHandle for MockSensorHandle {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn open_stream(&self) -> Result<()> {
        self.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close_stream(&self) -> Result<()> {
        if !self.streaming.swap(false, Ordering::SeqCst) {
            return Err(ContractError::driver(self.kind.friendly_name(), "stream not open"));
        }
        debug!(sensor = %self.kind, frames = self.frames.load(Ordering::Relaxed), "mock stream closed");
        Ok(())
    }

    fn next_frame(&self) -> Result<RawFrame> {
        if !self.streaming.load(Ordering::SeqCst) {
            return Err(ContractError::driver(self.kind.friendly_name(), "stream not open"));
        }

        let left = self.transient_left.load(Ordering::SeqCst);
        if left > 0 {
            self.transient_left.store(left - 1, Ordering::SeqCst);
            return Err(ContractError::transient(
                self.kind.friendly_name(),
                "request dropped",
            ));
        }

        let index = self.frames.load(Ordering::SeqCst);
        if let Some(limit) = self.config.fail_after_frames {
            if index >= limit {
                return Err(ContractError::driver(self.kind.friendly_name(), "device lost"));
            }
        }

        let timestamp = self.wait_for_slot(index);
        self.frames.fetch_add(1, Ordering::SeqCst);
        let resolution = self.config.resolution_for(self.kind);
        trace!(sensor = %self.kind, timestamp = timestamp.0, "mock frame pulled");

        Ok(RawFrame {
            timestamp,
            resolution,
            pixels: self.generate_pixels(resolution, index),
        })
    }

    fn resolution(&self) -> Result<Resolution> {
        Ok(self.config.resolution_for(self.kind))
    }

    fn extrinsics(&self) -> Result<Matrix4<f32>> {
        let offset = match self.kind {
            SensorKind::LeftFront => -0.05,
            SensorKind::LeftLeft => -0.1,
            SensorKind::RightFront => 0.05,
            SensorKind::RightRight => 0.1,
            SensorKind::DepthLongThrow | SensorKind::DepthAhat => 0.0,
        };
        let mut m = Matrix4::identity();
        m[(3, 0)] = offset;
        m[(3, 2)] = -0.02;
        Ok(m)
    }

    fn map_image_point_to_unit_plane(&self, uv: [f32; 2]) -> Option<[f32; 2]> {
        let resolution = self.config.resolution_for(self.kind);
        let cx = resolution.width as f32 / 2.0;
        let cy = resolution.height as f32 / 2.0;
        let x = (uv[0] - cx) / cx.max(1.0);
        let y = (uv[1] - cy) / cy.max(1.0);
        // Outside the calibrated field of view.
        if x * x + y * y > 1.5 {
            return None;
        }
        Some([x, y])
    }
}
