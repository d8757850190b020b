// src/signing/mod.rs

//! Repository index signing and trust-chain verification
//!
//! A signed repository carries a `Certification`: the signing certificate,
//! a JSON index of every file in the repository directory with its SHA-256
//! digest, and an Ed25519 signature over the index bytes. Remote caches
//! re-validate downloaded artifacts against the retained certification.

use crate::error::{Error, Result};
use crate::hash;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Signing identity for local repositories: a private key file and the
/// certificate published alongside signed indexes
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub private_key: PathBuf,
    pub certificate: PathBuf,
}

/// Ordered set of certificates trusted to sign repository indexes
///
/// An empty chain trusts any internally consistent certification.
#[derive(Debug, Clone, Default)]
pub struct TrustChain {
    certificates: Vec<String>,
}

impl TrustChain {
    pub fn new(certificates: Vec<String>) -> Self {
        Self { certificates }
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn contains(&self, certificate: &str) -> bool {
        self.certificates.iter().any(|c| c == certificate)
    }
}

/// Signed index of one repository directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    /// Base64-encoded Ed25519 verifying key
    pub certificate: String,
    /// JSON-serialized [`RepositoryIndex`]
    pub index: String,
    /// Base64-encoded signature over the index bytes
    pub signature: String,
}

/// Content index: every file in the repository with its digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub files: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub sha256: String,
}

/// A signing key pair for repository indexes
pub struct SigningKeyPair {
    signing_key: SigningKey,
    key_id: Option<String>,
}

impl SigningKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            key_id: None,
        }
    }

    /// Set a human-readable key identifier
    pub fn with_key_id(mut self, id: &str) -> Self {
        self.key_id = Some(id.to_string());
        self
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The certificate form of the public key
    pub fn certificate(&self) -> String {
        BASE64.encode(self.verifying_key().as_bytes())
    }

    /// Sign arbitrary bytes, returning the base64 signature
    pub fn sign(&self, content: &[u8]) -> String {
        BASE64.encode(self.signing_key.sign(content).to_bytes())
    }

    /// Save the key pair to files (private and public)
    pub fn save_to_files(&self, private_path: &Path, public_path: &Path) -> Result<()> {
        let private_data = KeyFile {
            algorithm: KEY_ALGORITHM.to_string(),
            key: BASE64.encode(self.signing_key.to_bytes()),
            key_id: self.key_id.clone(),
        };
        let private_toml = toml::to_string_pretty(&private_data)
            .map_err(|e| Error::SigningFailed(format!("failed to encode private key: {e}")))?;
        fs::write(private_path, private_toml).map_err(|e| {
            Error::IoError(format!(
                "failed to write private key {}: {e}",
                private_path.display()
            ))
        })?;

        // Private key is secret material
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(private_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(private_path, perms)?;
        }

        let public_data = KeyFile {
            algorithm: KEY_ALGORITHM.to_string(),
            key: self.certificate(),
            key_id: self.key_id.clone(),
        };
        let public_toml = toml::to_string_pretty(&public_data)
            .map_err(|e| Error::SigningFailed(format!("failed to encode public key: {e}")))?;
        fs::write(public_path, public_toml).map_err(|e| {
            Error::IoError(format!(
                "failed to write public key {}: {e}",
                public_path.display()
            ))
        })?;

        Ok(())
    }

    /// Load a key pair from a private key file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let key_file = KeyFile::load(path)?;
        let key_bytes = BASE64
            .decode(&key_file.key)
            .map_err(|e| Error::ParseError(format!("invalid base64 in key file: {e}")))?;
        let key_array: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| Error::ParseError("private key must be 32 bytes".to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_array),
            key_id: key_file.key_id,
        })
    }
}

const KEY_ALGORITHM: &str = "ed25519";

/// On-disk key file format
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    algorithm: String,
    key: String,
    #[serde(default)]
    key_id: Option<String>,
}

impl KeyFile {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("failed to read key file {}: {e}", path.display())))?;
        let key_file: KeyFile = toml::from_str(&content)
            .map_err(|e| Error::ParseError(format!("failed to parse key file {}: {e}", path.display())))?;
        if key_file.algorithm != KEY_ALGORITHM {
            return Err(Error::ParseError(format!(
                "unsupported key algorithm: {}",
                key_file.algorithm
            )));
        }
        Ok(key_file)
    }
}

/// Load a certificate (public key) from a key file
pub fn load_certificate(path: &Path) -> Result<String> {
    Ok(KeyFile::load(path)?.key)
}

/// Build the content index over every file under `dir`
///
/// Entries are relative paths with `/` separators, sorted, so the serialized
/// index is canonical for a given directory state.
pub fn build_index(dir: &Path) -> Result<RepositoryIndex> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry =
            entry.map_err(|e| Error::IoError(format!("failed to walk {}: {e}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::IoError(format!("path outside repository root: {e}")))?;
        files.push(IndexEntry {
            path: relative.to_string_lossy().replace('\\', "/"),
            sha256: hash::sha256_file(entry.path())?,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(RepositoryIndex { files })
}

/// Compute and sign the content index of a repository directory
///
/// Any failure here is a signing failure: a repository configured for
/// signing must not come up with an unsigned index.
pub fn sign_index(dir: &Path, config: &SigningConfig) -> Result<Certification> {
    let keypair = SigningKeyPair::load_from_file(&config.private_key)
        .map_err(|e| Error::SigningFailed(e.to_string()))?;
    let certificate = load_certificate(&config.certificate)
        .map_err(|e| Error::SigningFailed(e.to_string()))?;
    if certificate != keypair.certificate() {
        return Err(Error::SigningFailed(
            "certificate does not match the signing key".to_string(),
        ));
    }

    let index = build_index(dir).map_err(|e| Error::SigningFailed(e.to_string()))?;
    let index_json = serde_json::to_string(&index)
        .map_err(|e| Error::SigningFailed(format!("failed to encode index: {e}")))?;
    let signature = keypair.sign(index_json.as_bytes());

    debug!(
        "signed index of {} ({} files)",
        dir.display(),
        index.files.len()
    );

    Ok(Certification {
        certificate,
        index: index_json,
        signature,
    })
}

fn decode_verifying_key(certificate: &str) -> Result<VerifyingKey> {
    let key_bytes = BASE64
        .decode(certificate)
        .map_err(|e| Error::SignatureInvalid(format!("invalid certificate base64: {e}")))?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| Error::SignatureInvalid("certificate must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&key_array)
        .map_err(|e| Error::SignatureInvalid(format!("invalid certificate: {e}")))
}

/// Verify a certification's signature and trust-chain membership
pub fn verify_index(certification: &Certification, trust_chain: &TrustChain) -> Result<()> {
    if !trust_chain.is_empty() && !trust_chain.contains(&certification.certificate) {
        return Err(Error::SignatureInvalid(
            "certificate is not in the trust chain".to_string(),
        ));
    }

    let verifying_key = decode_verifying_key(&certification.certificate)?;
    let sig_bytes = BASE64
        .decode(&certification.signature)
        .map_err(|e| Error::SignatureInvalid(format!("invalid signature base64: {e}")))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|e| Error::SignatureInvalid(format!("invalid signature: {e}")))?;

    verifying_key
        .verify(certification.index.as_bytes(), &signature)
        .map_err(|_| Error::SignatureInvalid("index signature does not verify".to_string()))
}

/// Verify downloaded artifact bytes against the signed index
///
/// The artifact must appear in the index under `file_name` and hash to the
/// digest recorded there.
pub fn verify_artifact(
    certification: &Certification,
    file_name: &str,
    bytes: &[u8],
) -> Result<()> {
    let index: RepositoryIndex = serde_json::from_str(&certification.index)
        .map_err(|e| Error::SignatureInvalid(format!("malformed signed index: {e}")))?;

    let entry = index
        .files
        .iter()
        .find(|f| f.path == file_name)
        .ok_or_else(|| {
            Error::SignatureInvalid(format!("{file_name} is not covered by the signed index"))
        })?;

    let actual = hash::sha256_hex(bytes);
    if actual != entry.sha256 {
        return Err(Error::SignatureInvalid(format!(
            "{file_name} does not match the signed index: expected {}, got {actual}",
            entry.sha256
        )));
    }
    Ok(())
}

/// Verify a directory against a certification: signature, trust chain, and
/// recomputed content index must all match
pub fn verify_directory(
    dir: &Path,
    certification: &Certification,
    trust_chain: &TrustChain,
) -> Result<()> {
    verify_index(certification, trust_chain)?;

    let current = build_index(dir)?;
    let signed: RepositoryIndex = serde_json::from_str(&certification.index)
        .map_err(|e| Error::SignatureInvalid(format!("malformed signed index: {e}")))?;
    if current != signed {
        return Err(Error::SignatureInvalid(format!(
            "{} has been modified since the index was signed",
            dir.display()
        )));
    }
    Ok(())
}
