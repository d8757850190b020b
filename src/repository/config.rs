// src/repository/config.rs

//! Repository configuration
//!
//! A `RepositoryConfig` is a read-only description supplied by the caller;
//! the cache only observes it. The `version` field is a monotonically
//! increasing staleness marker the registry uses to decide when a cached
//! instance must be rebuilt.

use crate::error::{Error, Result};
use crate::version;
use std::path::PathBuf;
use url::Url;

/// Which package versions a repository exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionMode {
    #[default]
    All,
    /// Releases only
    Stable,
    /// Snapshots only
    Snapshot,
}

impl VersionMode {
    /// Whether a version or archive file name is visible under this mode
    pub fn permits(&self, version_or_file_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Stable => !version::is_snapshot(version_or_file_name),
            Self::Snapshot => version::is_snapshot(version_or_file_name),
        }
    }
}

/// Where a repository's packages live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    /// Directory on the local filesystem (`file://` URI)
    Local,
    /// Remote registry reached over RPC (`http(s)://` URI)
    Remote,
}

/// Read-only description of one repository
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub id: String,
    pub uri: String,
    pub mode: VersionMode,
    /// When true, snapshot archive file names must carry a build timestamp
    pub strict: bool,
    pub kind: RepositoryKind,
    pub published: bool,
    /// Access token sent with remote fetches
    pub digest: Option<String>,
    /// Repository name on the remote registry; defaults to `id`
    pub remote_name: Option<String>,
    /// Monotonically increasing staleness marker
    pub version: i64,
}

impl RepositoryConfig {
    pub fn new(id: impl Into<String>, uri: impl Into<String>, kind: RepositoryKind) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            mode: VersionMode::All,
            strict: false,
            kind,
            published: true,
            digest: None,
            remote_name: None,
            version: 0,
        }
    }

    /// Check that the URI scheme is consistent with the repository kind
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.uri).map_err(|e| {
            Error::InvalidConfig(format!("repository {}: invalid uri {}: {e}", self.id, self.uri))
        })?;

        let expected = match url.scheme() {
            "file" => RepositoryKind::Local,
            "http" | "https" => RepositoryKind::Remote,
            other => {
                return Err(Error::InvalidConfig(format!(
                    "repository {}: unsupported uri scheme {other}",
                    self.id
                )));
            }
        };
        if expected != self.kind {
            return Err(Error::InvalidConfig(format!(
                "repository {}: uri {} does not match repository kind {:?}",
                self.id, self.uri, self.kind
            )));
        }
        Ok(())
    }

    /// The backing directory of a local repository
    pub fn local_path(&self) -> Result<PathBuf> {
        let url = Url::parse(&self.uri)
            .map_err(|e| Error::InvalidConfig(format!("invalid uri {}: {e}", self.uri)))?;
        url.to_file_path()
            .map_err(|_| Error::InvalidConfig(format!("{} is not a file uri", self.uri)))
    }

    /// Name used towards the remote registry
    pub fn remote_name(&self) -> &str {
        self.remote_name.as_deref().unwrap_or(&self.id)
    }

    /// Access token for remote fetches; blank when not configured
    pub fn digest(&self) -> &str {
        self.digest.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_permits() {
        assert!(VersionMode::All.permits("demo-2.0.0-SNAPSHOT-20240101-0000.zip"));
        assert!(VersionMode::Stable.permits("demo-1.0.0.zip"));
        assert!(!VersionMode::Stable.permits("demo-2.0.0-SNAPSHOT-20240101-0000.zip"));
        assert!(VersionMode::Snapshot.permits("2.0.0-SNAPSHOT"));
        assert!(!VersionMode::Snapshot.permits("1.0.0"));
    }

    #[test]
    fn test_validate_scheme_kind_consistency() {
        let local = RepositoryConfig::new("r1", "file:///srv/packages", RepositoryKind::Local);
        local.validate().unwrap();

        let remote = RepositoryConfig::new("r2", "https://registry.example.com", RepositoryKind::Remote);
        remote.validate().unwrap();

        let mismatch = RepositoryConfig::new("r3", "https://registry.example.com", RepositoryKind::Local);
        assert!(matches!(mismatch.validate(), Err(Error::InvalidConfig(_))));

        let bad_scheme = RepositoryConfig::new("r4", "ftp://example.com", RepositoryKind::Remote);
        assert!(matches!(bad_scheme.validate(), Err(Error::InvalidConfig(_))));

        let garbage = RepositoryConfig::new("r5", "not a uri", RepositoryKind::Local);
        assert!(matches!(garbage.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_local_path() {
        let config = RepositoryConfig::new("r1", "file:///srv/packages", RepositoryKind::Local);
        assert_eq!(config.local_path().unwrap(), PathBuf::from("/srv/packages"));

        let remote = RepositoryConfig::new("r2", "https://example.com", RepositoryKind::Remote);
        assert!(remote.local_path().is_err());
    }

    #[test]
    fn test_remote_name_defaults_to_id() {
        let mut config = RepositoryConfig::new("r1", "https://example.com", RepositoryKind::Remote);
        assert_eq!(config.remote_name(), "r1");
        config.remote_name = Some("upstream".to_string());
        assert_eq!(config.remote_name(), "upstream");
    }
}
