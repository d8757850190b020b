// tests/repository.rs

//! End-to-end tests for the filesystem repository cache, driven entirely
//! through the public API with real directories and the filename-convention
//! archive reader.

use depot::repository::{RepositoryCache, RepositoryConfig, RepositoryKind, VersionMode};
use depot::signing::{self, SigningConfig, SigningKeyPair, TrustChain};
use depot::{FileNameArchiveReader, FilesystemRepositoryCache, RepositoryCacheRegistry};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn write_archive(dir: &TempDir, file_name: &str) {
    fs::write(dir.path().join(file_name), file_name.as_bytes()).unwrap();
}

fn local_config(dir: &TempDir) -> RepositoryConfig {
    RepositoryConfig::new(
        "integration",
        format!("file://{}", dir.path().display()),
        RepositoryKind::Local,
    )
}

fn open_cache(dir: &TempDir) -> FilesystemRepositoryCache {
    FilesystemRepositoryCache::open(
        local_config(dir),
        Arc::new(FileNameArchiveReader::new()),
        None,
    )
    .unwrap()
}

#[test]
fn snapshot_bucketing_over_a_real_directory() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");
    write_archive(&dir, "demo-1.0.1.zip");
    write_archive(&dir, "demo-2.0.0-SNAPSHOT-20240101-0000.zip");
    write_archive(&dir, "demo-2.0.0-SNAPSHOT-20240102-0000.zip");

    let cache = open_cache(&dir);

    let versions = cache.versions("demo").unwrap();
    assert_eq!(versions.len(), 4);

    let bucket = cache.package_bucket("demo").unwrap().unwrap();
    assert_eq!(bucket.latest_release().unwrap().version, "1.0.1");

    let snapshot = bucket.latest_snapshot().unwrap();
    assert_eq!(snapshot.version, "2.0.0-SNAPSHOT");
    assert_eq!(snapshot.timestamp, "20240102-0000");
}

#[test]
fn delete_last_version_removes_the_package() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");
    write_archive(&dir, "other-1.0.0.zip");

    let cache = open_cache(&dir);
    cache.delete_version("demo", "1.0.0", "").unwrap();

    assert!(cache.package_bucket("demo").unwrap().is_none());
    let names: Vec<String> = cache
        .applications(None)
        .unwrap()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(names, vec!["other"]);
    assert!(!dir.path().join("demo-1.0.0.zip").exists());
}

#[test]
fn wildcard_and_prefix_name_filters() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-app-1.0.0.zip");
    write_archive(&dir, "demo-core-1.0.0.zip");
    write_archive(&dir, "other-app-1.0.0.zip");

    let cache = open_cache(&dir);

    let wildcard: Vec<String> = cache
        .applications(Some("demo*"))
        .unwrap()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(wildcard, vec!["demo-app", "demo-core"]);

    let prefix: Vec<String> = cache
        .applications(Some("demo"))
        .unwrap()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(prefix, vec!["demo-app", "demo-core"]);
}

#[test]
fn external_changes_are_picked_up_on_reload() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");

    let cache = open_cache(&dir);
    assert_eq!(cache.versions("demo").unwrap().len(), 1);

    // Another process drops a new build and removes the old one
    write_archive(&dir, "demo-1.1.0.zip");
    fs::remove_file(dir.path().join("demo-1.0.0.zip")).unwrap();
    cache.reload().unwrap();

    let versions = cache.versions("demo").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, "1.1.0");
}

#[test]
fn snapshot_only_repository_hides_releases() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");
    write_archive(&dir, "demo-2.0.0-SNAPSHOT-20240101-0000.zip");

    let mut config = local_config(&dir);
    config.mode = VersionMode::Snapshot;
    let cache = FilesystemRepositoryCache::open(
        config,
        Arc::new(FileNameArchiveReader::new()),
        None,
    )
    .unwrap();

    let versions = cache.versions("demo").unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].is_snapshot());
}

#[test]
fn signed_repository_round_trip_and_tamper_detection() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");

    let keys = TempDir::new().unwrap();
    let private = keys.path().join("repo.private");
    let public = keys.path().join("repo.public");
    SigningKeyPair::generate()
        .with_key_id("integration")
        .save_to_files(&private, &public)
        .unwrap();
    let signing_config = SigningConfig {
        private_key: private,
        certificate: public,
    };

    let cache = FilesystemRepositoryCache::open(
        local_config(&dir),
        Arc::new(FileNameArchiveReader::new()),
        Some(&signing_config),
    )
    .unwrap();

    let certification = cache.certification().unwrap();
    let trusted = TrustChain::new(vec![certification.certificate.clone()]);
    signing::verify_directory(dir.path(), &certification, &trusted).unwrap();

    // Any byte flip in the repository breaks verification
    fs::write(dir.path().join("demo-1.0.0.zip"), b"tampered").unwrap();
    assert!(signing::verify_directory(dir.path(), &certification, &trusted).is_err());
}

#[test]
fn registry_shares_and_rebuilds_instances() {
    let dir = TempDir::new().unwrap();
    write_archive(&dir, "demo-1.0.0.zip");

    let registry = RepositoryCacheRegistry::new(Arc::new(FileNameArchiveReader::new()));
    let mut config = local_config(&dir);

    let first = registry.cache_for(&config).unwrap();
    let again = registry.cache_for(&config).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(first.versions("demo").unwrap().len(), 1);

    // A newer staleness marker forces a rebuild
    config.version += 1;
    let rebuilt = registry.cache_for(&config).unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
}
