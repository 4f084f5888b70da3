//! Consumer-facing pose layouts.
//!
//! `RigPose` holds the rig-to-world transform in row-vector form
//! (`p_world = p_rig * M`). Consumers read it as a flat 16-element array.

use contracts::RigPose;
use nalgebra::Matrix4;

/// Flattened rig-to-world transform handed to grayscale and depth consumers.
///
/// Element `[row][col]` of the stored matrix lands at index `col * 4 + row`.
pub fn consumer_transform(pose: &RigPose) -> [f32; 16] {
    pose.column_major()
}

/// Video consumer pose: `M^T * diag(1, -1, -1, 1)` flattened row-major.
///
/// Flips the device camera axes (y up, z backward) into the computer-vision
/// convention (y down, z forward).
pub fn cv_camera_transform(pose: &RigPose) -> [f32; 16] {
    let flip = Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, -1.0, -1.0, 1.0));
    let m = pose.matrix().transpose() * flip;

    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = m[(row, col)];
        }
    }
    out
}

/// `timestamp,` followed by 16 column-major components.
pub fn format_pose_line(timestamp: impl std::fmt::Display, pose: &RigPose) -> String {
    format!("{},{}", timestamp, format_column_major(pose.matrix()))
}

/// 16 comma-separated values, iterated column-outer, row-inner.
pub fn format_column_major(m: &Matrix4<f32>) -> String {
    m.as_slice()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct() -> RigPose {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (10 * (r + 1) + c + 1) as f32;
            }
        }
        RigPose::from_rows(rows)
    }

    #[test]
    fn test_consumer_transform_reorders_every_cell() {
        let pose = distinct();
        let out = consumer_transform(&pose);
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(out[col * 4 + row], pose.get(row, col), "cell [{row}][{col}]");
            }
        }
        assert_eq!(&out[..4], &[11.0, 21.0, 31.0, 41.0]);
    }

    #[test]
    fn test_cv_camera_transform_negates_y_and_z_columns() {
        let pose = distinct();
        let out = cv_camera_transform(&pose);
        for row in 0..4 {
            for col in 0..4 {
                let sign = if col == 1 || col == 2 { -1.0 } else { 1.0 };
                assert_eq!(out[row * 4 + col], sign * pose.get(col, row));
            }
        }
    }

    #[test]
    fn test_pose_line_layout() {
        let line = format_pose_line(7u64, &distinct());
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[0], "7");
        assert_eq!(fields[1], "11");
        assert_eq!(fields[2], "21");
        assert_eq!(fields[5], "12");
        assert_eq!(fields[16], "44");
    }
}
