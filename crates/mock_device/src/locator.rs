//! Mock spatial tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{PoseLocator, ReferenceFrame, RelativeTicks, SpatialLocation};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::trace;

/// Rig slowly yawing and drifting along x.
///
/// With `lose_tracking_every(n)` every n-th lookup reports tracking lost.
#[derive(Debug, Default)]
pub struct MockPoseLocator {
    lose_every: Option<u64>,
    calls: AtomicU64,
}

impl MockPoseLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lose_tracking_every(n: u64) -> Self {
        Self {
            lose_every: Some(n.max(1)),
            calls: AtomicU64::new(0),
        }
    }

    /// Never resolves a pose.
    pub fn lost() -> Self {
        Self::lose_tracking_every(1)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl PoseLocator for MockPoseLocator {
    fn locate(&self, timestamp: RelativeTicks, frame: &ReferenceFrame) -> Option<SpatialLocation> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(n) = self.lose_every {
            if call % n == 0 {
                trace!(timestamp = timestamp.0, frame = %frame, "mock tracking lost");
                return None;
            }
        }

        let seconds = timestamp.0 as f32 * 1e-7;
        Some(SpatialLocation {
            orientation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), seconds * 0.1),
            position: Vector3::new(seconds * 0.01, 1.6, 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_loss_cadence() {
        let locator = MockPoseLocator::lose_tracking_every(3);
        let world: ReferenceFrame = "world".into();
        let hits: Vec<bool> = (0..6)
            .map(|i| locator.locate(RelativeTicks(i), &world).is_some())
            .collect();
        assert_eq!(hits, vec![true, true, false, true, true, false]);
        assert!(MockPoseLocator::lost()
            .locate(RelativeTicks(1), &world)
            .is_none());
    }
}
