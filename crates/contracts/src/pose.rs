//! Rig-to-world pose.
//!
//! Poses are kept in row-vector layout: a point `p` maps to `p * M`, the
//! rotation block is the transpose of the column-vector rotation, and the
//! translation lives in the last row.

use nalgebra::{Matrix3, Matrix4};

use crate::{AbsoluteTicks, SpatialLocation};

/// 4x4 rig-to-world transform in row-vector layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigPose(Matrix4<f32>);

impl Default for RigPose {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigPose {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        Self(matrix)
    }

    /// Build from row-major cells, `rows[r][c]` is `m[r][c]`.
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self(Matrix4::from_fn(|r, c| rows[r][c]))
    }

    /// Rotation followed by translation, composed in row-vector order.
    pub fn from_location(location: &SpatialLocation) -> Self {
        let rotation: Matrix3<f32> = location.orientation.to_rotation_matrix().into_inner();
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation.transpose());
        m[(3, 0)] = location.position.x;
        m[(3, 1)] = location.position.y;
        m[(3, 2)] = location.position.z;
        Self(m)
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.0
    }

    /// Cell `m[row][col]`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[(row, col)]
    }

    /// Cells iterated column-outer, row-inner: `out[col * 4 + row] = m[row][col]`.
    ///
    /// This is the order of every text dump and of the transform handed to consumers.
    pub fn column_major(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.0.as_slice());
        out
    }
}

/// One entry of a per-sensor pose log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp: AbsoluteTicks,
    pub pose: RigPose,
}
