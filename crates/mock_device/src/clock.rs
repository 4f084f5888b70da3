//! Shared device clock.

use std::sync::Arc;
use std::time::Instant;

use contracts::RelativeTicks;

/// Device-relative clock counting 100ns ticks since creation.
///
/// Cloned into every simulated sensor so that frame timestamps and
/// [`SensorDevice::clock_ticks`](contracts::SensorDevice::clock_ticks) share one domain.
#[derive(Debug, Clone)]
pub struct MockClock {
    origin: Arc<Instant>,
    base: u64,
}

impl MockClock {
    /// `base` is added to every reading so timestamps never start at zero.
    pub fn new(base: u64) -> Self {
        Self {
            origin: Arc::new(Instant::now()),
            base,
        }
    }

    pub fn now(&self) -> RelativeTicks {
        let elapsed = self.origin.elapsed().as_nanos() / 100;
        RelativeTicks(self.base + elapsed as u64)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(10_000_000)
    }
}
