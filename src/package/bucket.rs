// src/package/bucket.rs

//! Per-package-name version bucket
//!
//! A bucket owns every known version of one package name and derives the
//! "latest release" / "latest snapshot" views from them. The derived fields
//! are a pure function of the version map; [`PackageBucket::reindex`] must
//! run after every mutation before any derived field is read. Scan code
//! batches the reindex once per cycle instead of once per file.

use crate::error::{Error, Result};
use crate::package::{PackageInfo, version_key};
use crate::version;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PackageBucket {
    name: String,
    versions: HashMap<String, PackageInfo>,
    latest_release: Option<PackageInfo>,
    latest_snapshot: Option<PackageInfo>,
    latest_snapshot_per_version: HashMap<String, PackageInfo>,
}

impl PackageBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Insert or overwrite one version
    pub fn add(&mut self, info: PackageInfo) {
        self.versions.insert(info.version_key(), info);
    }

    /// Remove one version by its `(version, timestamp)` coordinates
    pub fn remove(&mut self, version: &str, timestamp: &str) -> Result<PackageInfo> {
        self.versions
            .remove(&version_key(version, timestamp))
            .ok_or_else(|| {
                Error::NotFoundError(format!(
                    "package {} has no version {version} {timestamp}",
                    self.name
                ))
            })
    }

    /// Look up one version by its `(version, timestamp)` coordinates
    pub fn get(&self, version: &str, timestamp: &str) -> Option<&PackageInfo> {
        self.versions.get(&version_key(version, timestamp))
    }

    /// All known versions, newest first
    pub fn versions(&self) -> Vec<PackageInfo> {
        let mut all: Vec<PackageInfo> = self.versions.values().cloned().collect();
        all.sort_by(version::compare);
        all
    }

    /// Highest-ranked non-snapshot entry, if any
    pub fn latest_release(&self) -> Option<&PackageInfo> {
        self.latest_release.as_ref()
    }

    /// Highest-ranked snapshot entry, if any
    pub fn latest_snapshot(&self) -> Option<&PackageInfo> {
        self.latest_snapshot.as_ref()
    }

    /// Highest-ranked snapshot entry for one base version string
    pub fn latest_snapshot_for(&self, version: &str) -> Option<&PackageInfo> {
        self.latest_snapshot_per_version.get(version)
    }

    /// Recompute the derived "latest" views from the version map
    pub fn reindex(&mut self) {
        self.latest_release = None;
        self.latest_snapshot = None;
        self.latest_snapshot_per_version.clear();

        for info in self.versions.values() {
            if info.is_snapshot() {
                if version::is_newer(info, self.latest_snapshot.as_ref()) {
                    self.latest_snapshot = Some(info.clone());
                }
                if version::is_newer(info, self.latest_snapshot_per_version.get(&info.version)) {
                    self.latest_snapshot_per_version
                        .insert(info.version.clone(), info.clone());
                }
            } else if version::is_newer(info, self.latest_release.as_ref()) {
                self.latest_release = Some(info.clone());
            }
        }
    }
}
