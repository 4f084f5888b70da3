//! Relative-to-absolute tick conversion.

use chrono::{DateTime, Utc};
use contracts::{AbsoluteTicks, RelativeTicks};

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_DIFFERENCE_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Maps a sensor's relative clock onto absolute ticks (100ns since 1601-01-01 UTC).
///
/// The offset is captured once; afterwards the mapping is a pure, monotonic shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeConverter {
    offset: i64,
}

impl TimeConverter {
    /// Anchor the device clock reading `relative_now` to the current wall clock.
    pub fn calibrate(relative_now: RelativeTicks) -> Self {
        Self::anchored_at(relative_now, Utc::now())
    }

    pub fn anchored_at(relative_now: RelativeTicks, wall: DateTime<Utc>) -> Self {
        let absolute_now = absolute_ticks_of(wall);
        Self {
            offset: absolute_now - relative_now.0 as i64,
        }
    }

    /// Fixed offset, in ticks.
    pub fn with_offset(offset: i64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn relative_to_absolute(&self, relative: RelativeTicks) -> AbsoluteTicks {
        let absolute = (relative.0 as i64).saturating_add(self.offset);
        AbsoluteTicks(absolute.max(0) as u64)
    }
}

/// Absolute ticks of a UTC instant.
pub fn absolute_ticks_of(wall: DateTime<Utc>) -> i64 {
    (wall.timestamp() + EPOCH_DIFFERENCE_SECS) * TICKS_PER_SECOND
        + i64::from(wall.timestamp_subsec_nanos()) / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch_in_absolute_ticks() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(absolute_ticks_of(epoch), 116_444_736_000_000_000);
    }

    #[test]
    fn test_anchor_maps_now_to_wall_clock() {
        let wall = Utc.timestamp_opt(1_700_000_000, 500).unwrap();
        let converter = TimeConverter::anchored_at(RelativeTicks(42), wall);
        assert_eq!(
            converter.relative_to_absolute(RelativeTicks(42)).0 as i64,
            absolute_ticks_of(wall)
        );
        assert_eq!(
            converter.relative_to_absolute(RelativeTicks(52)).0
                - converter.relative_to_absolute(RelativeTicks(42)).0,
            10
        );
    }

    #[test]
    fn test_monotonic() {
        let converter = TimeConverter::calibrate(RelativeTicks(1_000));
        let a = converter.relative_to_absolute(RelativeTicks(1_000));
        let b = converter.relative_to_absolute(RelativeTicks(1_001));
        assert!(b > a);
    }
}
