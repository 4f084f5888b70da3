//! Spatial tracking collaborator.

use nalgebra::{UnitQuaternion, Vector3};

use crate::{ReferenceFrame, RelativeTicks};

/// Rig location reported by the tracking service for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialLocation {
    pub orientation: UnitQuaternion<f32>,
    pub position: Vector3<f32>,
}

impl SpatialLocation {
    pub fn identity() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            position: Vector3::zeros(),
        }
    }
}

/// Converts a timestamp into a rig-to-world location.
///
/// `None` means tracking is lost for that instant. Callers skip the frame.
/// Implementations must be cheap: they are called on the acquisition path.
pub trait PoseLocator: Send + Sync {
    fn locate(&self, timestamp: RelativeTicks, frame: &ReferenceFrame) -> Option<SpatialLocation>;
}
