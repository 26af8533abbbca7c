use std::fmt;

use crate::error::{Result, StemError};
use crate::tree::{AttrValue, Group};

pub const ATTR_MAJOR:   &str = "version_major";
pub const ATTR_MINOR:   &str = "version_minor";
pub const ATTR_RELEASE: &str = "version_release";

/// `major.minor.release` format version stamped on every topgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major:   u32,
    pub minor:   u32,
    pub release: u32,
}

impl Version {
    /// Version written by this build.
    pub const CURRENT: Version = Version::new(0, 12, 0);
    /// Oldest layout this reader decodes.
    pub const MIN_SUPPORTED: Version = Version::new(0, 12, 0);

    pub const fn new(major: u32, minor: u32, release: u32) -> Self {
        Self { major, minor, release }
    }

    pub fn is_geq(self, other: Version) -> bool {
        self >= other
    }

    /// Readable by this build: at least `MIN_SUPPORTED` and no newer
    /// major.minor than `CURRENT`.
    pub fn is_supported(self) -> bool {
        self.is_geq(Self::MIN_SUPPORTED)
            && (self.major, self.minor) <= (Self::CURRENT.major, Self::CURRENT.minor)
    }

    pub fn check_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(StemError::UnsupportedVersion {
                found:     self,
                min:       Self::MIN_SUPPORTED,
                max_minor: format!("{}.{}", Self::CURRENT.major, Self::CURRENT.minor),
            })
        }
    }

    /// Read the version attributes of a topgroup. `None` if any is missing.
    pub fn from_group(group: &Group) -> Option<Self> {
        let get = |key| group.attr(key).and_then(AttrValue::as_int).and_then(|v| u32::try_from(v).ok());
        Some(Self::new(get(ATTR_MAJOR)?, get(ATTR_MINOR)?, get(ATTR_RELEASE)?))
    }

    pub fn stamp(self, group: &mut Group) {
        group.set_attr(ATTR_MAJOR,   AttrValue::Int(self.major as i64));
        group.set_attr(ATTR_MINOR,   AttrValue::Int(self.minor as i64));
        group.set_attr(ATTR_RELEASE, AttrValue::Int(self.release as i64));
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}
