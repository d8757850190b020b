// src/package/mod.rs

//! Package descriptors and per-name version buckets
//!
//! A [`PackageInfo`] describes one installable package version as extracted
//! from an archive or reported by a remote registry. Descriptors are created
//! once and never mutated; buckets own every known version of one package
//! name and derive the "latest" views from them.

mod bucket;

pub use bucket::PackageBucket;

use crate::version;
use serde::{Deserialize, Serialize};

/// Kind of installable package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
    #[default]
    Application,
    Template,
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application => write!(f, "application"),
            Self::Template => write!(f, "template"),
        }
    }
}

/// Role grants bundled with a package; carried through untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Property defaults shipped with a package; carried through untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyDefault {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Descriptor of one package version
///
/// Created by an archive reader when a package file is parsed, or
/// deserialized from a remote registry response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    /// Free-form version string, often but not always SemVer
    pub version: String,
    /// Build timestamp, pattern `yyyyMMdd-HHmm`; may be empty
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub app_platform_version: String,
    #[serde(rename = "type", default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
    #[serde(default)]
    pub properties: Vec<PropertyDefault>,
}

impl PackageInfo {
    /// Create a descriptor with the given coordinates and empty metadata
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            timestamp: String::new(),
            display_name: String::new(),
            description: String::new(),
            long_description: String::new(),
            app_platform_version: String::new(),
            package_type: PackageType::Application,
            roles: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// True when this descriptor denotes a snapshot build
    pub fn is_snapshot(&self) -> bool {
        version::is_snapshot(&self.version)
    }

    /// Key identifying this version inside its bucket
    pub fn version_key(&self) -> String {
        version_key(&self.version, &self.timestamp)
    }
}

/// Derive the bucket key for a `(version, timestamp)` pair
///
/// Releases are keyed by version alone; snapshots append the build
/// timestamp. A snapshot with a blank timestamp keys as the bare version.
pub fn version_key(version: &str, timestamp: &str) -> String {
    if version::is_snapshot(version) && !timestamp.is_empty() {
        format!("{version}-{timestamp}")
    } else {
        version.to_string()
    }
}
