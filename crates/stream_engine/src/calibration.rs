//! Per-sensor calibration and pose log files written at the end of a recording.
//!
//! | file | content |
//! |---|---|
//! | `<name>_extrinsics.txt` | rig-relative extrinsics, one column-major line |
//! | `<name>_lut.bin` | `width * height * 3` f32 unit directions, row-major, native byte order |
//! | `<name>_rig2world.txt` | one `timestamp,<16 values>` line per pose sample |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use contracts::{PoseSample, Resolution, SensorHandle};
use nalgebra::Matrix4;
use tracing::{debug, instrument};

use crate::pose::{format_column_major, format_pose_line};

/// One normalized `(x, y, z)` per pixel, sampled at pixel centers.
///
/// Pixels the driver cannot map are written as `(0, 0, 0)`.
pub fn build_lut(handle: &dyn SensorHandle, resolution: Resolution) -> Vec<f32> {
    let mut lut = Vec::with_capacity(resolution.pixel_count() * 3);
    for y in 0..resolution.height {
        let v = y as f32 + 0.5;
        for x in 0..resolution.width {
            let u = x as f32 + 0.5;
            match handle.map_image_point_to_unit_plane([u, v]) {
                Some([px, py]) => {
                    let inv_norm = 1.0 / (px * px + py * py + 1.0).sqrt();
                    lut.extend_from_slice(&[px * inv_norm, py * inv_norm, inv_norm]);
                }
                None => lut.extend_from_slice(&[0.0, 0.0, 0.0]),
            }
        }
    }
    lut
}

pub fn extrinsics_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{name}_extrinsics.txt"))
}

pub fn lut_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{name}_lut.bin"))
}

pub fn pose_log_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{name}_rig2world.txt"))
}

pub fn write_extrinsics(folder: &Path, name: &str, extrinsics: &Matrix4<f32>) -> io::Result<PathBuf> {
    let path = extrinsics_path(folder, name);
    fs::write(&path, format!("{}\n", format_column_major(extrinsics)))?;
    Ok(path)
}

pub fn write_lut(folder: &Path, name: &str, lut: &[f32]) -> io::Result<PathBuf> {
    let path = lut_path(folder, name);
    fs::write(&path, bytemuck::cast_slice::<f32, u8>(lut))?;
    Ok(path)
}

pub fn write_pose_log(folder: &Path, name: &str, samples: &[PoseSample]) -> io::Result<PathBuf> {
    let mut text = String::with_capacity(samples.len() * 160);
    for sample in samples {
        text.push_str(&format_pose_line(sample.timestamp, &sample.pose));
        text.push('\n');
    }
    let path = pose_log_path(folder, name);
    fs::write(&path, text)?;
    Ok(path)
}

/// Extrinsics followed by the LUT.
#[instrument(skip(handle), fields(sensor = %handle.friendly_name()))]
pub fn dump_calibration(
    handle: &dyn SensorHandle,
    resolution: Resolution,
    folder: &Path,
) -> crate::Result<()> {
    let name = handle.friendly_name();
    let extrinsics = handle
        .extrinsics()
        .map_err(|e| crate::EngineError::driver(&name, e))?;
    write_extrinsics(folder, &name, &extrinsics)?;

    let lut = build_lut(handle, resolution);
    write_lut(folder, &name, &lut)?;
    debug!(width = resolution.width, height = resolution.height, "calibration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AbsoluteTicks, RigPose, SensorKind};
    use mock_device::{MockClock, MockDeviceConfig, MockSensorHandle};

    fn handle() -> MockSensorHandle {
        MockSensorHandle::new(
            SensorKind::LeftFront,
            MockDeviceConfig::fast(),
            MockClock::default(),
        )
    }

    #[test]
    fn test_lut_has_unit_vectors_or_zero() {
        let handle = handle();
        let resolution = Resolution::new(8, 6);
        let lut = build_lut(&handle, resolution);
        assert_eq!(lut.len(), 8 * 6 * 3);

        for px in lut.chunks_exact(3) {
            let norm = (px[0] * px[0] + px[1] * px[1] + px[2] * px[2]).sqrt();
            assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-5, "norm {norm}");
        }
    }

    #[test]
    fn test_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle();
        dump_calibration(&handle, Resolution::new(4, 3), dir.path()).unwrap();

        let extrinsics = fs::read_to_string(extrinsics_path(dir.path(), "VLC LF")).unwrap();
        assert!(extrinsics.ends_with('\n'));
        assert_eq!(extrinsics.trim_end().split(',').count(), 16);

        let lut = fs::read(lut_path(dir.path(), "VLC LF")).unwrap();
        assert_eq!(lut.len(), 4 * 3 * 3 * 4);
    }

    #[test]
    fn test_pose_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let samples = [
            PoseSample {
                timestamp: AbsoluteTicks(100),
                pose: RigPose::identity(),
            },
            PoseSample {
                timestamp: AbsoluteTicks(200),
                pose: RigPose::identity(),
            },
        ];
        let path = write_pose_log(dir.path(), "AHAT", &samples).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "100,1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1");
        assert!(lines[1].starts_with("200,"));
    }
}
