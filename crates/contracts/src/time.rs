//! Tick domains.
//!
//! Both domains count hundreds of nanoseconds. They differ only in their origin.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device-relative timestamp as reported by a sensor clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelativeTicks(pub u64);

/// Cross-sensor comparable timestamp (100ns since 1601-01-01 UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsoluteTicks(pub u64);

impl fmt::Display for RelativeTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AbsoluteTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
