//! Mock color camera
//!
//! Pushes frames to the registered callback from a background thread, the
//! same way a media capture pipeline delivers arrival events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{
    CameraIntrinsics, Result, VideoFrame, VideoFrameCallback, VideoFrameSource, VideoPixelFormat,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::MockClock;

/// Mock video configuration
#[derive(Debug, Clone)]
pub struct MockVideoConfig {
    /// Frame rate (Hz)
    pub frequency_hz: f64,
    pub width: u32,
    pub height: u32,
    /// Pixel format of delivered frames
    pub format: VideoPixelFormat,
    pub fx: f32,
    pub fy: f32,
}

impl Default for MockVideoConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 30.0,
            width: 760,
            height: 428,
            format: VideoPixelFormat::Bgra8,
            fx: 590.0,
            fy: 590.0,
        }
    }
}

impl MockVideoConfig {
    /// Small frames at a high rate, for tests.
    pub fn fast() -> Self {
        Self {
            frequency_hz: 200.0,
            width: 4,
            height: 3,
            fx: 2.0,
            fy: 2.0,
            ..Self::default()
        }
    }
}

/// Simulated photo/video camera
pub struct MockVideoSource {
    config: MockVideoConfig,
    clock: MockClock,
    running: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MockVideoSource {
    pub fn new(config: MockVideoConfig, clock: MockClock) -> Self {
        Self {
            config,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            delivered: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MockVideoConfig::default(), MockClock::default())
    }

    /// Frames handed to the callback so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn generate(config: &MockVideoConfig, index: u64) -> Vec<u8> {
        let bpp = config.format.bytes_per_pixel();
        let count = config.width as usize * config.height as usize;
        let mut data = Vec::with_capacity(count * bpp);
        for i in 0..count {
            let row = (i / config.width as usize) as u8;
            match config.format {
                VideoPixelFormat::Gray8 => data.push(row.wrapping_add(index as u8)),
                VideoPixelFormat::Bgra8 | VideoPixelFormat::Rgba8 => {
                    data.extend_from_slice(&[row, index as u8, 0x40, 0xff])
                }
            }
        }
        data
    }
}

impl VideoFrameSource for MockVideoSource {
    fn start(&self, callback: VideoFrameCallback) -> Result<()> {
        // Idempotent: if already running, don't start again
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let config = self.config.clone();
        let clock = self.clock.clone();
        let running = self.running.clone();
        let delivered = self.delivered.clone();
        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz.max(1.0));

        let handle = thread::spawn(move || {
            debug!(
                width = config.width,
                height = config.height,
                frequency_hz = config.frequency_hz,
                "mock video started"
            );
            let mut index: u64 = 0;
            while running.load(Ordering::Relaxed) {
                let frame = VideoFrame {
                    timestamp: clock.now(),
                    intrinsics: CameraIntrinsics {
                        fx: config.fx,
                        fy: config.fy,
                        cx: config.width as f32 / 2.0,
                        cy: config.height as f32 / 2.0,
                        width: config.width,
                        height: config.height,
                    },
                    format: config.format,
                    width: config.width,
                    height: config.height,
                    data: Self::generate(&config, index),
                };
                trace!(timestamp = frame.timestamp.0, "mock video frame arrived");
                callback(Arc::new(frame));
                delivered.fetch_add(1, Ordering::Relaxed);
                index += 1;
                thread::sleep(interval);
            }
            debug!(frames = index, "mock video stopped");
        });

        *self.worker.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}
