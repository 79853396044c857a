//! Version coordinates within a family

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FamilyError;

/// A `(major, minor)` coordinate in a schema family.
///
/// Ordering compares the major version first, then the minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: usize,
    pub minor: usize,
}

impl SchemaVersion {
    /// Create a new coordinate
    pub const fn new(major: usize, minor: usize) -> Self {
        Self { major, minor }
    }

    /// Parse from `"1.2"`, `"v1.2"` or a semver string with a zero patch (`"1.2.0"`)
    pub fn parse(version_str: &str) -> Result<Self, FamilyError> {
        let trimmed = version_str.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        if trimmed.matches('.').count() >= 2 {
            let version = semver::Version::parse(trimmed)
                .map_err(|e| FamilyError::InvalidVersion(format!("{}: {}", version_str, e)))?;
            return Self::try_from(&version);
        }

        let (major, minor) = trimmed
            .split_once('.')
            .ok_or_else(|| FamilyError::InvalidVersion(version_str.to_string()))?;
        let parse_part = |part: &str| {
            part.parse::<usize>()
                .map_err(|e| FamilyError::InvalidVersion(format!("{}: {}", version_str, e)))
        };

        Ok(Self::new(parse_part(major)?, parse_part(minor)?))
    }

    /// Check if this is a major version bump from another version
    pub fn is_major_bump_from(&self, other: &SchemaVersion) -> bool {
        self.major > other.major
    }

    /// Check if this is a minor version bump from another version
    pub fn is_minor_bump_from(&self, other: &SchemaVersion) -> bool {
        self.major == other.major && self.minor > other.minor
    }

    /// Semver form with a zero patch (e.g. `1.2.0`)
    pub fn to_semver(&self) -> semver::Version {
        semver::Version::new(self.major as u64, self.minor as u64, 0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = FamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<(usize, usize)> for SchemaVersion {
    fn from((major, minor): (usize, usize)) -> Self {
        Self::new(major, minor)
    }
}

impl TryFrom<&semver::Version> for SchemaVersion {
    type Error = FamilyError;

    fn try_from(version: &semver::Version) -> Result<Self, Self::Error> {
        if version.patch != 0 || !version.pre.is_empty() {
            return Err(FamilyError::InvalidVersion(format!(
                "{}: family versions carry no patch or pre-release component",
                version
            )));
        }
        let to_usize = |n: u64| {
            usize::try_from(n).map_err(|_| FamilyError::InvalidVersion(version.to_string()))
        };
        Ok(Self::new(to_usize(version.major)?, to_usize(version.minor)?))
    }
}
