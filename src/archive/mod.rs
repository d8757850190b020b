// src/archive/mod.rs

//! Archive reading seam
//!
//! Descriptor extraction from archive contents lives behind the
//! [`ArchiveReader`] trait; the cache never looks inside a zip itself.
//! [`FileNameArchiveReader`] is the bundled implementation: it derives the
//! descriptor from the `name-version[-timestamp].zip` naming convention and
//! hashes the file contents.

use crate::error::Result;
use crate::hash;
use crate::package::{PackageInfo, PackageType};
use crate::version;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of validating and parsing one archive file
///
/// Archive-level validation failures are not errors: they come back with
/// `valid == false` and no descriptor, and the caller excludes the file.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub valid: bool,
    pub info: Option<PackageInfo>,
    pub checksum: String,
}

impl ArchiveOutcome {
    /// Outcome for a file that failed validation
    pub fn invalid() -> Self {
        Self {
            valid: false,
            info: None,
            checksum: String::new(),
        }
    }

    /// The descriptor, when the archive validated
    pub fn into_info(self) -> Option<PackageInfo> {
        if self.valid { self.info } else { None }
    }
}

/// Validates and parses package archives
pub trait ArchiveReader: Send + Sync {
    /// Validate and parse one archive file
    ///
    /// Returns `Err` only for environmental failures (the file cannot be
    /// read); a well-read archive that fails validation yields
    /// [`ArchiveOutcome::invalid`].
    fn read(&self, path: &Path) -> Result<ArchiveOutcome>;
}

/// A parsed archive bundled with its on-disk location
#[derive(Debug, Clone)]
pub struct PackageArchive {
    pub path: PathBuf,
    pub file_name: String,
    pub info: PackageInfo,
    pub checksum: String,
}

impl PackageArchive {
    pub fn new(path: PathBuf, info: PackageInfo, checksum: String) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            info,
            checksum,
        }
    }
}

/// Archive file name pattern: `name-version[-timestamp].zip`
///
/// The name is one or more dash-separated words starting with a letter; the
/// version starts with a digit and may carry the snapshot suffix; the
/// optional trailing timestamp is `yyyyMMdd-HHmm`.
const FILE_NAME_PATTERN: &str = r"^(?P<name>[A-Za-z][A-Za-z0-9_.]*(?:-[A-Za-z][A-Za-z0-9_.]*)*)-(?P<version>[0-9][A-Za-z0-9_.]*(?:-SNAPSHOT)?)(?:-(?P<ts>[0-9]{8}-[0-9]{4}))?\.zip$";

/// Reader deriving descriptors from the archive naming convention
///
/// Template archives are recognized by a `-template` name suffix; everything
/// else is an application.
pub struct FileNameArchiveReader {
    pattern: Regex,
    /// When set, snapshot archives without a build timestamp are invalid
    strict: bool,
}

impl FileNameArchiveReader {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(FILE_NAME_PATTERN).expect("file name pattern is valid"),
            strict: false,
        }
    }

    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::new()
        }
    }

    fn parse_file_name(&self, file_name: &str) -> Option<PackageInfo> {
        let captures = self.pattern.captures(file_name)?;
        let name = captures.name("name")?.as_str();
        let version = captures.name("version")?.as_str();
        let timestamp = captures.name("ts").map(|m| m.as_str()).unwrap_or("");

        if self.strict && version::is_snapshot(version) && timestamp.is_empty() {
            return None;
        }
        // A timestamp on a release build is not part of the convention
        if !version::is_snapshot(version) && !timestamp.is_empty() {
            return None;
        }

        let mut info = PackageInfo::new(name, version);
        info.timestamp = timestamp.to_string();
        info.display_name = name.to_string();
        info.package_type = if name.ends_with("-template") {
            PackageType::Template
        } else {
            PackageType::Application
        };
        Some(info)
    }
}

impl Default for FileNameArchiveReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveReader for FileNameArchiveReader {
    fn read(&self, path: &Path) -> Result<ArchiveOutcome> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(info) = self.parse_file_name(&file_name) else {
            debug!("archive name {file_name} does not match the naming convention");
            return Ok(ArchiveOutcome::invalid());
        };

        let checksum = hash::sha256_file(path)?;
        Ok(ArchiveOutcome {
            valid: true,
            info: Some(info),
            checksum,
        })
    }
}
