//! Schema versioning utilities

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of a category schema, recorded on every definition authored
/// against it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
}

/// How a definition's recorded version relates to the catalog schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    /// Authored against the current schema
    Current,
    /// Authored against an older schema; needs migration before editing
    Stale,
    /// Authored against a schema newer than the catalog knows
    Newer,
}

impl SchemaVersion {
    /// Create a new schema version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
        }
    }

    /// Create from a version string
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        // Strip leading 'v' if present
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(version_str)?;
        Ok(Self { version })
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Compare a definition's recorded version against this (catalog) version
    pub fn check(&self, authored: &SchemaVersion) -> VersionCheck {
        match authored.cmp(self) {
            std::cmp::Ordering::Equal => VersionCheck::Current,
            std::cmp::Ordering::Less => VersionCheck::Stale,
            std::cmp::Ordering::Greater => VersionCheck::Newer,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}
