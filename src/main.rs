// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use depot::repository::{RepositoryCache, RepositoryConfig, RepositoryKind, VersionMode};
use depot::signing::{self, SigningConfig, SigningKeyPair, TrustChain};
use depot::{FilesystemRepositoryCache, FileNameArchiveReader};
use std::path::Path;
use std::sync::Arc;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List {
            repo,
            filter,
            stable_only,
        } => {
            let cache = open_repository(&repo, stable_only)?;
            let buckets = cache.applications(filter.as_deref())?;
            if buckets.is_empty() {
                println!("no packages found");
                return Ok(());
            }
            for bucket in buckets {
                let release = bucket
                    .latest_release()
                    .map(|i| i.version_key())
                    .unwrap_or_else(|| "-".to_string());
                let snapshot = bucket
                    .latest_snapshot()
                    .map(|i| i.version_key())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<32} versions: {:<3} latest release: {:<16} latest snapshot: {}",
                    bucket.name(),
                    bucket.len(),
                    release,
                    snapshot
                );
            }
        }

        Commands::Versions { repo, name } => {
            let cache = open_repository(&repo, false)?;
            for info in cache.versions(&name)? {
                let kind = if info.is_snapshot() { "snapshot" } else { "release" };
                println!("{:<40} {} {}", info.version_key(), kind, info.package_type);
            }
        }

        Commands::Delete {
            repo,
            name,
            version,
            timestamp,
        } => {
            let cache = open_repository(&repo, false)?;
            cache.delete_version(&name, &version, &timestamp)?;
            println!("deleted {name} {version} {timestamp}");
        }

        Commands::Keygen {
            private,
            public,
            key_id,
        } => {
            let mut keypair = SigningKeyPair::generate();
            if let Some(id) = &key_id {
                keypair = keypair.with_key_id(id);
            }
            keypair.save_to_files(&private, &public)?;
            println!("wrote {} and {}", private.display(), public.display());
            println!("certificate: {}", keypair.certificate());
        }

        Commands::Sign {
            repo,
            key,
            cert,
            output,
        } => {
            let config = SigningConfig {
                private_key: key,
                certificate: cert,
            };
            let certification = signing::sign_index(&repo, &config)?;
            let json = serde_json::to_string_pretty(&certification)?;
            std::fs::write(&output, json)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("signed {} -> {}", repo.display(), output.display());
        }

        Commands::VerifyIndex {
            repo,
            certification,
            trust,
        } => {
            let json = std::fs::read_to_string(&certification)
                .with_context(|| format!("failed to read {}", certification.display()))?;
            let certification: signing::Certification = serde_json::from_str(&json)?;
            let trust_chain = TrustChain::new(trust);
            signing::verify_directory(&repo, &certification, &trust_chain)?;
            println!("{} verifies against the signed index", repo.display());
        }
    }

    Ok(())
}

fn open_repository(path: &Path, stable_only: bool) -> Result<FilesystemRepositoryCache> {
    let path = path
        .canonicalize()
        .with_context(|| format!("repository directory {} not found", path.display()))?;
    let mut config = RepositoryConfig::new(
        "local",
        format!("file://{}", path.display()),
        RepositoryKind::Local,
    );
    if stable_only {
        config.mode = VersionMode::Stable;
    }
    let cache =
        FilesystemRepositoryCache::open(config, Arc::new(FileNameArchiveReader::new()), None)?;
    Ok(cache)
}
