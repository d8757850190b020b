// src/repository/client.rs

//! Remote registry RPC client
//!
//! A thin wrapper around a blocking reqwest client. Each registry operation
//! is one POST to `{base}/{OperationName}` with a JSON body; the operation
//! names are part of wire compatibility. There are no retries here: a
//! transport failure surfaces to the caller as a download error carrying
//! the underlying cause.

use crate::error::{Error, Result};
use crate::package::PackageInfo;
use crate::signing::Certification;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

/// Default timeout for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a whole request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-configurable transport timeouts
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// `GetPackages` response: the repository's package list, with the signed
/// index when the registry publishes one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageListing {
    pub packages: Vec<PackageInfo>,
    #[serde(default)]
    pub certification: Option<Certification>,
}

/// `GetPackage` response: one archive with its declared checksum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDownload {
    pub file_name: String,
    pub checksum: String,
    /// Base64-encoded archive bytes
    pub data: String,
}

impl PackageDownload {
    /// Decode the archive bytes
    pub fn decode_data(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| Error::ParseError(format!("invalid base64 archive data: {e}")))
    }
}

#[derive(Serialize)]
struct ListRequest<'a> {
    repository: &'a str,
    digest: &'a str,
}

#[derive(Serialize)]
struct VersionsRequest<'a> {
    repository: &'a str,
    digest: &'a str,
    package: &'a str,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    repository: &'a str,
    digest: &'a str,
    package: &'a str,
    version: &'a str,
    timestamp: &'a str,
}

#[derive(Deserialize)]
struct VersionsResponse {
    packages: Vec<PackageInfo>,
}

#[derive(Deserialize)]
struct CertificationResponse {
    #[serde(default)]
    certification: Option<Certification>,
}

/// Blocking client for one remote registry
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| Error::DownloadError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn call<B: Serialize, R: DeserializeOwned>(&self, operation: &str, body: &B) -> Result<R> {
        let url = format!("{}/{operation}", self.base_url);
        debug!("registry call {url}");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| Error::DownloadError(format!("{operation} to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        response
            .json()
            .map_err(|e| Error::ParseError(format!("malformed {operation} response: {e}")))
    }

    /// Fetch the full package list of a remote repository
    pub fn get_packages(&self, repository: &str, digest: &str) -> Result<PackageListing> {
        self.call("GetPackages", &ListRequest { repository, digest })
    }

    /// Fetch the version list of one package
    pub fn get_package_versions(
        &self,
        repository: &str,
        digest: &str,
        package: &str,
    ) -> Result<Vec<PackageInfo>> {
        let response: VersionsResponse = self.call(
            "GetPackageVersions",
            &VersionsRequest {
                repository,
                digest,
                package,
            },
        )?;
        Ok(response.packages)
    }

    /// Fetch one package archive
    pub fn get_package(
        &self,
        repository: &str,
        digest: &str,
        package: &str,
        version: &str,
        timestamp: &str,
    ) -> Result<PackageDownload> {
        self.call(
            "GetPackage",
            &FetchRequest {
                repository,
                digest,
                package,
                version,
                timestamp,
            },
        )
    }

    /// Fetch the repository's signed index, when it publishes one
    pub fn get_certification(&self, repository: &str, digest: &str) -> Result<Option<Certification>> {
        let response: CertificationResponse =
            self.call("GetCertification", &ListRequest { repository, digest })?;
        Ok(response.certification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data() {
        let download = PackageDownload {
            file_name: "demo-1.0.0.zip".to_string(),
            checksum: String::new(),
            data: BASE64.encode(b"archive bytes"),
        };
        assert_eq!(download.decode_data().unwrap(), b"archive bytes");

        let garbage = PackageDownload {
            file_name: String::new(),
            checksum: String::new(),
            data: "not base64 !!!".to_string(),
        };
        assert!(matches!(garbage.decode_data(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            RegistryClient::new("https://registry.example.com/", &ClientOptions::default())
                .unwrap();
        assert_eq!(client.base_url, "https://registry.example.com");
    }

    #[test]
    fn test_listing_deserializes_without_certification() {
        let json = r#"{"packages":[{"name":"demo","version":"1.0.0","type":"APPLICATION"}]}"#;
        let listing: PackageListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.packages.len(), 1);
        assert!(listing.certification.is_none());
    }
}
