// src/lib.rs

//! Depot package repository cache
//!
//! Discovers, indexes, versions, and cryptographically authenticates
//! installable packages served from a local directory or a remote registry.
//!
//! # Architecture
//!
//! - Per-package version buckets derived from a single descending
//!   comparator (semver-aware, build-timestamp tie-break)
//! - Incremental directory scans diffed against the previous scan, with a
//!   per-instance lock guarding all mutation
//! - Ed25519-signed repository indexes; remote downloads re-validated
//!   against the retained certification
//! - A registry of cache instances keyed by repository id, rebuilt when a
//!   repository's location or staleness marker changes

pub mod archive;
mod error;
pub mod hash;
pub mod package;
pub mod repository;
pub mod signing;
pub mod version;

pub use archive::{ArchiveOutcome, ArchiveReader, FileNameArchiveReader, PackageArchive};
pub use error::{Error, Result};
pub use package::{PackageBucket, PackageInfo, PackageType, PropertyDefault, RoleGrant};
pub use repository::{
    ClientOptions, FilesystemRepositoryCache, RegistryClient, RemoteRepositoryCache,
    RepositoryCache, RepositoryCacheRegistry, RepositoryConfig, RepositoryKind, VersionMode,
};
pub use signing::{Certification, SigningConfig, SigningKeyPair, TrustChain};
