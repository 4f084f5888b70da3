//! ReferenceFrame - Cheap-to-clone handle to a spatial coordinate system
//!
//! Uses Arc<str> internally so engines and the video pipeline can share one
//! world frame without copying.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Named coordinate system that poses are expressed in.
///
/// The scenario hands the same `ReferenceFrame` to every engine when recording
/// starts, so cloning only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::ReferenceFrame;
///
/// let world: ReferenceFrame = "world".into();
/// let shared = world.clone();
/// assert_eq!(world, shared);
/// assert_eq!(world.as_str(), "world");
/// ```
#[derive(Clone)]
pub struct ReferenceFrame(Arc<str>);

impl ReferenceFrame {
    #[inline]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ReferenceFrame {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for ReferenceFrame {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ReferenceFrame {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceFrame({:?})", self.0)
    }
}

impl PartialEq for ReferenceFrame {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ReferenceFrame {}

impl PartialEq<&str> for ReferenceFrame {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Hash for ReferenceFrame {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ReferenceFrame {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReferenceFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
