// src/repository/remote_cache.rs

//! Remote repository cache
//!
//! Mirrors the package list of a remote registry. There is no file-diff
//! state: every refresh re-fetches the list and replaces the bucket map
//! wholesale. The registry's certification, when published, is retained on
//! first fetch and every downloaded archive is re-validated against it.
//! Remote repositories are read-only: deletion and out-of-band insertion
//! are unsupported.

use crate::archive::{ArchiveReader, PackageArchive};
use crate::error::{Error, Result};
use crate::hash;
use crate::package::{PackageBucket, PackageInfo};
use crate::repository::client::{ClientOptions, PackageDownload, RegistryClient};
use crate::repository::config::RepositoryConfig;
use crate::repository::{RepositoryCache, name_filter_matches};
use crate::signing::{self, Certification, TrustChain};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Default)]
struct RemoteState {
    buckets: HashMap<String, PackageBucket>,
    /// Signed index retained from the first successful list fetch
    certification: Option<Certification>,
}

pub struct RemoteRepositoryCache {
    config: RepositoryConfig,
    client: RegistryClient,
    reader: Arc<dyn ArchiveReader>,
    trust_chain: TrustChain,
    state: Mutex<RemoteState>,
}

impl std::fmt::Debug for RemoteRepositoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepositoryCache")
            .finish_non_exhaustive()
    }
}

impl RemoteRepositoryCache {
    /// Open a cache over a remote registry and run the first fetch
    ///
    /// When the first `GetPackages` response carries a certification, it is
    /// verified against the trust chain; a verification failure aborts
    /// construction.
    pub fn open(
        config: RepositoryConfig,
        reader: Arc<dyn ArchiveReader>,
        trust_chain: TrustChain,
        options: &ClientOptions,
    ) -> Result<Self> {
        config.validate()?;
        let client = RegistryClient::new(&config.uri, options)?;

        let cache = Self {
            config,
            client,
            reader,
            trust_chain,
            state: Mutex::new(RemoteState::default()),
        };
        {
            let mut state = cache.lock();
            cache.refresh(&mut state)?;
        }
        info!(
            "opened remote repository {} at {}",
            cache.config.id, cache.config.uri
        );
        Ok(cache)
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bucket_map(packages: Vec<PackageInfo>, config: &RepositoryConfig) -> HashMap<String, PackageBucket> {
        let mut buckets: HashMap<String, PackageBucket> = HashMap::new();
        for info in packages {
            if !config.mode.permits(&info.version) {
                continue;
            }
            buckets
                .entry(info.name.clone())
                .or_insert_with(|| PackageBucket::new(info.name.clone()))
                .add(info);
        }
        for bucket in buckets.values_mut() {
            bucket.reindex();
        }
        buckets
    }

    /// Re-fetch the full package list and replace the bucket map wholesale
    ///
    /// Buckets for names absent from the response are dropped.
    fn refresh(&self, state: &mut RemoteState) -> Result<()> {
        let listing = self
            .client
            .get_packages(self.config.remote_name(), self.config.digest())?;

        if state.certification.is_none()
            && let Some(certification) = listing.certification
        {
            signing::verify_index(&certification, &self.trust_chain)?;
            debug!("retained certification for {}", self.config.id);
            state.certification = Some(certification);
        }

        state.buckets = Self::bucket_map(listing.packages, &self.config);
        Ok(())
    }

    /// Re-fetch the version list of a single package
    fn refresh_package(&self, state: &mut RemoteState, name: &str) -> Result<()> {
        let packages = self.client.get_package_versions(
            self.config.remote_name(),
            self.config.digest(),
            name,
        )?;

        let mut buckets = Self::bucket_map(packages, &self.config);
        match buckets.remove(name) {
            Some(bucket) => {
                state.buckets.insert(name.to_string(), bucket);
            }
            None => {
                state.buckets.remove(name);
            }
        }
        Ok(())
    }

    /// Validate downloaded bytes: declared checksum first, then the signed
    /// index when a certification is retained
    fn check_download(
        download: &PackageDownload,
        bytes: &[u8],
        certification: Option<&Certification>,
    ) -> Result<()> {
        hash::verify_bytes(bytes, &download.checksum)?;
        if let Some(certification) = certification {
            signing::verify_artifact(certification, &download.file_name, bytes)?;
        }
        Ok(())
    }
}

impl RepositoryCache for RemoteRepositoryCache {
    fn reload(&self) -> Result<()> {
        let mut state = self.lock();
        self.refresh(&mut state)
    }

    fn add(&self, _archive: &PackageArchive) -> Result<bool> {
        Err(Error::UnsupportedError(format!(
            "repository {} is remote and read-only",
            self.config.id
        )))
    }

    fn applications(&self, name_filter: Option<&str>) -> Result<Vec<PackageBucket>> {
        let mut state = self.lock();
        self.refresh(&mut state)?;

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
        self.refresh(&mut state)?;
        Ok(state.buckets.get(name).cloned())
    }

    fn versions(&self, name: &str) -> Result<Vec<PackageInfo>> {
        let mut state = self.lock();
        self.refresh_package(&mut state, name)?;
        state
            .buckets
            .get(name)
            .map(|bucket| bucket.versions())
            .ok_or_else(|| Error::NotFoundError(format!("unknown package {name}")))
    }

    fn delete_version(&self, _name: &str, _version: &str, _timestamp: &str) -> Result<()> {
        Err(Error::UnsupportedError(format!(
            "repository {} is remote and read-only",
            self.config.id
        )))
    }

    fn get_archive(&self, name: &str, version: &str, timestamp: &str) -> Result<PackageArchive> {
        let certification = self.lock().certification.clone();

        let download = self.client.get_package(
            self.config.remote_name(),
            self.config.digest(),
            name,
            version,
            timestamp,
        )?;
        // The declared name must stay inside the staging directory
        if download.file_name.is_empty() || download.file_name.contains(['/', '\\']) {
            return Err(Error::ParseError(format!(
                "registry declared an illegal archive name: {}",
                download.file_name
            )));
        }
        let bytes = download.decode_data()?;

        // Staged under its declared name; the whole directory is dropped on
        // any verification failure below
        let staging = tempfile::Builder::new()
            .prefix("depot-download-")
            .tempdir()
            .map_err(|e| Error::IoError(format!("failed to create staging directory: {e}")))?;
        let staged_path = staging.path().join(&download.file_name);
        fs::write(&staged_path, &bytes)
            .map_err(|e| Error::IoError(format!("failed to write download: {e}")))?;

        Self::check_download(&download, &bytes, certification.as_ref())?;

        let outcome = self.reader.read(&staged_path)?;
        let checksum = outcome.checksum.clone();
        let Some(info) = outcome.into_info() else {
            return Err(Error::ParseError(format!(
                "downloaded archive {} failed validation",
                download.file_name
            )));
        };

        let kept: PathBuf = staging.keep();
        let path = kept.join(&download.file_name);
        debug!("downloaded {} to {}", download.file_name, path.display());

        Ok(PackageArchive {
            path,
            file_name: download.file_name,
            info,
            checksum,
        })
    }

    fn certification(&self) -> Option<Certification> {
        self.lock().certification.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::config::{RepositoryKind, VersionMode};
    use crate::signing::SigningKeyPair;

    fn snapshot_info(name: &str, version: &str, timestamp: &str) -> PackageInfo {
        let mut info = PackageInfo::new(name, version);
        info.timestamp = timestamp.to_string();
        info
    }

    #[test]
    fn test_bucket_map_replaces_wholesale() {
        let config = RepositoryConfig::new("r", "https://example.com", RepositoryKind::Remote);
        let buckets = RemoteRepositoryCache::bucket_map(
            vec![
                PackageInfo::new("demo", "1.0.0"),
                PackageInfo::new("demo", "1.0.1"),
                snapshot_info("other", "2.0.0-SNAPSHOT", "20240101-0000"),
            ],
            &config,
        );

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["demo"].latest_release().unwrap().version, "1.0.1");
        assert!(buckets["other"].latest_release().is_none());
        assert!(buckets["other"].latest_snapshot().is_some());
    }

    #[test]
    fn test_bucket_map_applies_mode_filter() {
        let mut config = RepositoryConfig::new("r", "https://example.com", RepositoryKind::Remote);
        config.mode = VersionMode::Stable;

        let buckets = RemoteRepositoryCache::bucket_map(
            vec![
                PackageInfo::new("demo", "1.0.0"),
                snapshot_info("demo", "2.0.0-SNAPSHOT", "20240101-0000"),
            ],
            &config,
        );
        assert_eq!(buckets["demo"].len(), 1);
    }

    #[test]
    fn test_check_download_checksum_mismatch() {
        let download = PackageDownload {
            file_name: "demo-1.0.0.zip".to_string(),
            checksum: hash::sha256_hex(b"expected bytes"),
            data: String::new(),
        };

        let err =
            RemoteRepositoryCache::check_download(&download, b"other bytes", None).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_check_download_against_certification() {
        let keypair = SigningKeyPair::generate();
        let index = serde_json::to_string(&crate::signing::RepositoryIndex {
            files: vec![crate::signing::IndexEntry {
                path: "demo-1.0.0.zip".to_string(),
                sha256: hash::sha256_hex(b"archive bytes"),
            }],
        })
        .unwrap();
        let certification = Certification {
            certificate: keypair.certificate(),
            signature: keypair.sign(index.as_bytes()),
            index,
        };

        let download = PackageDownload {
            file_name: "demo-1.0.0.zip".to_string(),
            checksum: hash::sha256_hex(b"archive bytes"),
            data: String::new(),
        };
        RemoteRepositoryCache::check_download(&download, b"archive bytes", Some(&certification))
            .unwrap();

        // Bytes matching the declared checksum but not the signed index
        let tampered = PackageDownload {
            file_name: "demo-1.0.0.zip".to_string(),
            checksum: hash::sha256_hex(b"tampered bytes"),
            data: String::new(),
        };
        let err = RemoteRepositoryCache::check_download(
            &tampered,
            b"tampered bytes",
            Some(&certification),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
    }
}
