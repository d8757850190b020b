// src/repository/fs_cache.rs

//! Filesystem repository cache
//!
//! Scans a directory of package archives, diffs each scan against the
//! previous one, and maintains per-package version buckets. Rescans are
//! throttled by a scan period so request-driven accessors do not hammer the
//! backing filesystem. When a signing identity is configured, the whole
//! directory is indexed and signed once at startup.

use crate::archive::{ArchiveReader, PackageArchive};
use crate::error::{Error, Result};
use crate::package::{PackageBucket, PackageInfo};
use crate::repository::config::RepositoryConfig;
use crate::repository::{RepositoryCache, name_filter_matches};
use crate::signing::{self, Certification, SigningConfig};
use crate::version;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Minimum interval between directory rescans
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(10);

/// Archive file extension this cache indexes
const ARCHIVE_EXTENSION: &str = "zip";

/// State mutated exclusively under the scan lock
#[derive(Default)]
struct ScanState {
    buckets: HashMap<String, PackageBucket>,
    /// What the last successful scan found
    active_files: HashMap<PathBuf, PackageInfo>,
    /// File names known to fail validation; pruned when they leave the
    /// directory listing so a replaced file is parsed again
    invalid_files: HashSet<String>,
    last_scan: Option<Instant>,
}

pub struct FilesystemRepositoryCache {
    config: RepositoryConfig,
    root: PathBuf,
    reader: Arc<dyn ArchiveReader>,
    scan_period: Duration,
    certification: Option<Certification>,
    state: Mutex<ScanState>,
}

impl std::fmt::Debug for FilesystemRepositoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemRepositoryCache")
            .field("root", &self.root)
            .field("scan_period", &self.scan_period)
            .finish_non_exhaustive()
    }
}

impl FilesystemRepositoryCache {
    /// Open a cache over the configured directory and run the first scan
    ///
    /// When `signing` is configured the directory index is signed before
    /// the scan; a signing failure aborts construction.
    pub fn open(
        config: RepositoryConfig,
        reader: Arc<dyn ArchiveReader>,
        signing: Option<&SigningConfig>,
    ) -> Result<Self> {
        config.validate()?;
        let root = config.local_path()?;
        if !root.is_dir() {
            return Err(Error::IoError(format!(
                "repository directory {} does not exist",
                root.display()
            )));
        }

        let certification = match signing {
            Some(signing_config) => Some(signing::sign_index(&root, signing_config)?),
            None => None,
        };

        let cache = Self {
            config,
            root,
            reader,
            scan_period: DEFAULT_SCAN_PERIOD,
            certification,
            state: Mutex::new(ScanState::default()),
        };

        {
            let mut state = cache.lock();
            cache.scan(&mut state, true)?;
        }
        info!(
            "opened filesystem repository {} at {}",
            cache.config.id,
            cache.root.display()
        );
        Ok(cache)
    }

    /// Override the rescan throttle interval
    pub fn with_scan_period(mut self, period: Duration) -> Self {
        self.scan_period = period;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// List archive files currently in the repository directory
    fn list_archives(&self) -> Result<Vec<(PathBuf, String)>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::IoError(format!("failed to list {}: {e}", self.root.display())))?;

        let mut listing = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| Error::IoError(format!("failed to list {}: {e}", self.root.display())))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXTENSION) {
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            listing.push((path, file_name));
        }
        Ok(listing)
    }

    /// Rescan the directory and apply the diff to the bucket map
    ///
    /// Throttled to once per scan period unless `force` is set. Runs with
    /// the state lock held; `add` and `delete_version` share the same lock
    /// so no caller ever observes a half-applied scan.
    fn scan(&self, state: &mut ScanState, force: bool) -> Result<()> {
        if !force
            && let Some(last) = state.last_scan
            && last.elapsed() < self.scan_period
        {
            return Ok(());
        }

        let listing = self.list_archives()?;

        // A file that left the directory may come back changed; drop its
        // invalid-file memo as soon as it disappears from the listing.
        let present: HashSet<&String> = listing.iter().map(|(_, name)| name).collect();
        state.invalid_files.retain(|name| present.contains(name));

        let mut touched: HashSet<String> = HashSet::new();
        let mut next_active: HashMap<PathBuf, PackageInfo> = HashMap::new();

        for (path, file_name) in listing {
            if !self.config.mode.permits(&file_name) {
                continue;
            }
            if state.invalid_files.contains(&file_name) {
                continue;
            }
            if let Some(info) = state.active_files.get(&path) {
                // Unchanged since the last scan; no re-parse
                next_active.insert(path, info.clone());
                continue;
            }

            let outcome = match self.reader.read(&path) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Environmental failure; retried on the next scan
                    warn!("failed to read archive {file_name}: {e}");
                    continue;
                }
            };
            match outcome.into_info() {
                Some(info) => {
                    debug!("indexed {file_name} as {} {}", info.name, info.version_key());
                    let bucket = state
                        .buckets
                        .entry(info.name.clone())
                        .or_insert_with(|| PackageBucket::new(info.name.clone()));
                    bucket.add(info.clone());
                    touched.insert(info.name.clone());
                    next_active.insert(path, info);
                }
                None => {
                    debug!("excluding invalid archive {file_name}");
                    state.invalid_files.insert(file_name);
                }
            }
        }

        // Files present in the previous scan but gone from the listing
        for (path, info) in &state.active_files {
            if next_active.contains_key(path) {
                continue;
            }
            debug!("archive {} removed from repository", path.display());
            if let Some(bucket) = state.buckets.get_mut(&info.name) {
                let _ = bucket.remove(&info.version, &info.timestamp);
                touched.insert(info.name.clone());
            }
        }

        for name in &touched {
            if let Some(bucket) = state.buckets.get_mut(name) {
                bucket.reindex();
                if bucket.is_empty() {
                    state.buckets.remove(name);
                }
            }
        }

        state.active_files = next_active;
        state.last_scan = Some(Instant::now());
        Ok(())
    }

    /// Resolve the descriptor a `(version, timestamp)` request denotes
    ///
    /// Priority order: blank version takes the latest snapshot overall; a
    /// snapshot version without a timestamp takes the latest snapshot of
    /// that version; a full snapshot coordinate is exact; anything else is
    /// the release with that exact version.
    fn select_version<'a>(
        bucket: &'a PackageBucket,
        version: &str,
        timestamp: &str,
    ) -> Result<&'a PackageInfo> {
        let selected = if version.is_empty() {
            bucket.latest_snapshot()
        } else if version::is_snapshot(version) && timestamp.is_empty() {
            bucket.latest_snapshot_for(version)
        } else {
            bucket.get(version, timestamp)
        };

        selected.ok_or_else(|| {
            Error::NotFoundError(format!(
                "package {} has no version matching '{version}' '{timestamp}'",
                bucket.name()
            ))
        })
    }

    /// Resolve the archive file backing a descriptor
    ///
    /// Tries `name-version-timestamp.zip` first; outside strict mode an
    /// absent timestamped file falls back to `name-version.zip`.
    fn resolve_file(&self, info: &PackageInfo) -> Result<PathBuf> {
        if !info.timestamp.is_empty() {
            let stamped = self.root.join(format!(
                "{}-{}-{}.{ARCHIVE_EXTENSION}",
                info.name, info.version, info.timestamp
            ));
            if stamped.is_file() {
                return Ok(stamped);
            }
            if self.config.strict {
                return Err(Error::NotFoundError(format!(
                    "archive {} does not exist",
                    stamped.display()
                )));
            }
        }

        let plain = self
            .root
            .join(format!("{}-{}.{ARCHIVE_EXTENSION}", info.name, info.version));
        if plain.is_file() {
            Ok(plain)
        } else {
            Err(Error::NotFoundError(format!(
                "archive {} does not exist",
                plain.display()
            )))
        }
    }
}

impl RepositoryCache for FilesystemRepositoryCache {
    fn reload(&self) -> Result<()> {
        let mut state = self.lock();
        self.scan(&mut state, true)
    }

    fn add(&self, archive: &PackageArchive) -> Result<bool> {
        // Same validation as the scan path; an upload that fails it is
        // excluded, not an error
        let outcome = self.reader.read(&archive.path)?;
        let Some(info) = outcome.into_info() else {
            debug!("rejecting invalid upload {}", archive.file_name);
            return Ok(false);
        };
        if !self.config.mode.permits(&archive.file_name) {
            debug!(
                "upload {} is not visible under mode {:?}",
                archive.file_name, self.config.mode
            );
            return Ok(false);
        }

        let mut state = self.lock();
        let bucket = state
            .buckets
            .entry(info.name.clone())
            .or_insert_with(|| PackageBucket::new(info.name.clone()));
        bucket.add(info.clone());
        bucket.reindex();
        state
            .active_files
            .insert(self.root.join(&archive.file_name), info);
        Ok(true)
    }

    fn applications(&self, name_filter: Option<&str>) -> Result<Vec<PackageBucket>> {
        let mut state = self.lock();
        self.scan(&mut state, false)?;

        let mut buckets: Vec<PackageBucket> = state
            .buckets
            .values()
            .filter(|b| name_filter.is_none_or(|f| name_filter_matches(f, b.name())))
            .cloned()
            .collect();
        buckets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(buckets)
    }

    fn package_bucket(&self, name: &str) -> Result<Option<PackageBucket>> {
        let mut state = self.lock();
        self.scan(&mut state, false)?;
        Ok(state.buckets.get(name).cloned())
    }

    fn versions(&self, name: &str) -> Result<Vec<PackageInfo>> {
        let mut state = self.lock();
        self.scan(&mut state, false)?;
        state
            .buckets
            .get(name)
            .map(|bucket| bucket.versions())
            .ok_or_else(|| Error::NotFoundError(format!("unknown package {name}")))
    }

    fn delete_version(&self, name: &str, version: &str, timestamp: &str) -> Result<()> {
        let mut state = self.lock();
        self.scan(&mut state, false)?;

        let info = {
            let bucket = state
                .buckets
                .get(name)
                .ok_or_else(|| Error::NotFoundError(format!("unknown package {name}")))?;
            Self::select_version(bucket, version, timestamp)?.clone()
        };
        let path = self.resolve_file(&info)?;

        fs::remove_file(&path)
            .map_err(|e| Error::IoError(format!("failed to delete {}: {e}", path.display())))?;
        info!("deleted {} {} from {}", info.name, info.version_key(), self.config.id);

        if let Some(bucket) = state.buckets.get_mut(name) {
            bucket.remove(&info.version, &info.timestamp)?;
            bucket.reindex();
            if bucket.is_empty() {
                state.buckets.remove(name);
            }
        }
        state.active_files.remove(&path);
        Ok(())
    }

    fn get_archive(&self, name: &str, version: &str, timestamp: &str) -> Result<PackageArchive> {
        let mut state = self.lock();
        self.scan(&mut state, false)?;

        let bucket = state
            .buckets
            .get(name)
            .ok_or_else(|| Error::NotFoundError(format!("unknown package {name}")))?;
        let info = Self::select_version(bucket, version, timestamp)?.clone();
        let path = self.resolve_file(&info)?;

        let outcome = self.reader.read(&path)?;
        Ok(PackageArchive::new(path, info, outcome.checksum))
    }

    fn certification(&self) -> Option<Certification> {
        self.certification.clone()
    }
}
