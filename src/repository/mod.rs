// src/repository/mod.rs

//! Repository caches
//!
//! This module provides functionality for:
//! - Browsing the packages of a local directory or a remote registry
//! - Incremental rescans that keep per-package version buckets current
//! - Signed repository indexes and their verification
//! - A process-wide registry of cache instances keyed by repository id

mod client;
mod config;
mod fs_cache;
mod registry;
mod remote_cache;

// Re-export main types and functions
pub use client::{ClientOptions, PackageDownload, PackageListing, RegistryClient};
pub use config::{RepositoryConfig, RepositoryKind, VersionMode};
pub use fs_cache::{DEFAULT_SCAN_PERIOD, FilesystemRepositoryCache};
pub use registry::RepositoryCacheRegistry;
pub use remote_cache::RemoteRepositoryCache;

use crate::archive::PackageArchive;
use crate::error::Result;
use crate::package::{PackageBucket, PackageInfo};
use crate::signing::Certification;
use regex::Regex;

/// One repository's package cache
///
/// Every read accessor refreshes the cache from its backing source first
/// (throttled for filesystem repositories), so callers always observe a
/// recent view without driving the refresh themselves.
pub trait RepositoryCache: Send + Sync + std::fmt::Debug {
    /// Force a full refresh, bypassing any throttle
    fn reload(&self) -> Result<()>;

    /// Out-of-band insertion of a just-uploaded archive
    ///
    /// Returns `false` when the archive fails validation or is not visible
    /// under the repository's version mode.
    fn add(&self, archive: &PackageArchive) -> Result<bool>;

    /// All package buckets, optionally filtered by name
    ///
    /// A filter containing `*` is a wildcard match over the whole name;
    /// otherwise it matches as a prefix.
    fn applications(&self, name_filter: Option<&str>) -> Result<Vec<PackageBucket>>;

    /// The bucket for one package name, if known
    fn package_bucket(&self, name: &str) -> Result<Option<PackageBucket>>;

    /// All known versions of one package, newest first
    fn versions(&self, name: &str) -> Result<Vec<PackageInfo>>;

    /// Delete one version; see the version-selection rule in the
    /// implementations for how blank coordinates resolve
    fn delete_version(&self, name: &str, version: &str, timestamp: &str) -> Result<()>;

    /// Fetch one version's archive
    fn get_archive(&self, name: &str, version: &str, timestamp: &str) -> Result<PackageArchive>;

    /// The signed index of this repository, when signing is configured
    fn certification(&self) -> Option<Certification>;
}

/// Match a package name against a filter
///
/// `*` makes the filter a wildcard pattern over the whole name; without it
/// the filter matches as a plain prefix.
pub(crate) fn name_filter_matches(filter: &str, name: &str) -> bool {
    if filter.contains('*') {
        let pattern = format!("^{}$", regex::escape(filter).replace(r"\*", ".*"));
        Regex::new(&pattern)
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    } else {
        name.starts_with(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_filter() {
        assert!(name_filter_matches("demo*", "demo-app"));
        assert!(name_filter_matches("demo*", "demo-core"));
        assert!(!name_filter_matches("demo*", "other-app"));
        assert!(name_filter_matches("*-app", "other-app"));
        assert!(!name_filter_matches("*-app", "app-other"));
    }

    #[test]
    fn test_prefix_filter() {
        assert!(name_filter_matches("demo", "demo-app"));
        assert!(name_filter_matches("demo", "demo"));
        assert!(!name_filter_matches("demo", "other-app"));
    }

    #[test]
    fn test_filter_escapes_regex_metacharacters() {
        assert!(name_filter_matches("demo.app*", "demo.app-core"));
        assert!(!name_filter_matches("demo.app*", "demoXapp-core"));
    }
}
