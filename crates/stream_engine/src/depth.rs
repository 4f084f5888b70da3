//! Per-pixel depth validity.

use contracts::{DepthMode, DepthPlanes};

/// Long-range mode: a sigma byte with this bit set marks the pixel invalid.
pub const LONG_THROW_INVALID_MASK: u8 = 0x80;

/// Short-range mode: raw values at or above this are saturated.
pub const AHAT_INVALID_VALUE: u16 = 4090;

#[inline]
pub fn validate_long_throw(depth: u16, sigma: u8) -> u16 {
    if sigma & LONG_THROW_INVALID_MASK != 0 {
        0
    } else {
        depth
    }
}

#[inline]
pub fn validate_ahat(depth: u16) -> u16 {
    if depth >= AHAT_INVALID_VALUE {
        0
    } else {
        depth
    }
}

/// Builds the cached depth buffer: validated depth plane followed by the
/// active-brightness plane, untouched.
///
/// Returns `None` when planes disagree in length or the long-range sigma
/// plane is missing.
pub fn validated_planes(mode: DepthMode, planes: &DepthPlanes) -> Option<Vec<u16>> {
    let n = planes.depth.len();
    if planes.active_brightness.len() != n {
        return None;
    }

    let mut out = Vec::with_capacity(n * 2);
    match mode {
        DepthMode::LongRange => {
            let sigma = planes.sigma.as_ref().filter(|s| s.len() == n)?;
            out.extend(
                planes
                    .depth
                    .iter()
                    .zip(sigma)
                    .map(|(&d, &s)| validate_long_throw(d, s)),
            );
        }
        DepthMode::ShortRange => {
            out.extend(planes.depth.iter().map(|&d| validate_ahat(d)));
        }
    }
    out.extend_from_slice(&planes.active_brightness);
    Some(out)
}
