// src/error.rs

//! Crate-wide error type
//!
//! Archive-level validation failures are deliberately NOT represented here:
//! an archive that fails validation is excluded from the index and logged,
//! never surfaced as an error. Everything else is a typed variant.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Repository URI or scheme is inconsistent with the repository kind
    #[error("invalid repository configuration: {0}")]
    InvalidConfig(String),

    /// Unknown package, version, or file
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Index or artifact signature failed verification
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Local index signing failed during cache initialization; fatal for
    /// the repository being opened
    #[error("repository index signing failed: {0}")]
    SigningFailed(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Remote transport failure, preserving the underlying cause
    #[error("download failed: {0}")]
    DownloadError(String),

    /// Operation not available for this repository kind
    #[error("unsupported operation: {0}")]
    UnsupportedError(String),

    /// Downloaded artifact does not match its declared checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Malformed metadata, index, or key material
    #[error("parse error: {0}")]
    ParseError(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}
