// src/repository/registry.rs

//! Process-wide registry of repository cache instances
//!
//! Caches are keyed by repository id. An entry is rebuilt when the backing
//! repository's location changes or its staleness marker moves past the
//! cached instance's; otherwise the existing instance is shared.

use crate::archive::ArchiveReader;
use crate::error::Result;
use crate::repository::client::ClientOptions;
use crate::repository::config::{RepositoryConfig, RepositoryKind};
use crate::repository::fs_cache::FilesystemRepositoryCache;
use crate::repository::remote_cache::RemoteRepositoryCache;
use crate::repository::RepositoryCache;
use crate::signing::{SigningConfig, TrustChain};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

struct CacheSlot {
    uri: String,
    version: i64,
    cache: Arc<dyn RepositoryCache>,
}

pub struct RepositoryCacheRegistry {
    reader: Arc<dyn ArchiveReader>,
    /// Signing identity applied to every local repository, when configured
    signing: Option<SigningConfig>,
    trust_chain: TrustChain,
    client_options: ClientOptions,
    caches: Mutex<HashMap<String, CacheSlot>>,
}

impl RepositoryCacheRegistry {
    pub fn new(reader: Arc<dyn ArchiveReader>) -> Self {
        Self {
            reader,
            signing: None,
            trust_chain: TrustChain::default(),
            client_options: ClientOptions::default(),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Sign local repository indexes with this identity
    pub fn with_signing(mut self, signing: SigningConfig) -> Self {
        self.signing = Some(signing);
        self
    }

    /// Trust chain for remote repository certifications
    pub fn with_trust_chain(mut self, trust_chain: TrustChain) -> Self {
        self.trust_chain = trust_chain;
        self
    }

    /// Transport timeouts for remote fetches
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = options;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheSlot>> {
        match self.caches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Return the cache for a repository, building or rebuilding it as needed
    pub fn cache_for(&self, config: &RepositoryConfig) -> Result<Arc<dyn RepositoryCache>> {
        config.validate()?;

        let mut caches = self.lock();
        if let Some(slot) = caches.get(&config.id) {
            if slot.uri == config.uri && slot.version >= config.version {
                return Ok(slot.cache.clone());
            }
            debug!(
                "evicting stale cache for repository {} (uri or version changed)",
                config.id
            );
            caches.remove(&config.id);
        }

        let cache = self.build(config)?;
        info!("registered cache for repository {}", config.id);
        caches.insert(
            config.id.clone(),
            CacheSlot {
                uri: config.uri.clone(),
                version: config.version,
                cache: cache.clone(),
            },
        );
        Ok(cache)
    }

    /// Drop the cached instance for one repository, if any
    pub fn evict(&self, id: &str) {
        self.lock().remove(id);
    }

    fn build(&self, config: &RepositoryConfig) -> Result<Arc<dyn RepositoryCache>> {
        match config.kind {
            RepositoryKind::Local => Ok(Arc::new(FilesystemRepositoryCache::open(
                config.clone(),
                self.reader.clone(),
                self.signing.as_ref(),
            )?)),
            RepositoryKind::Remote => Ok(Arc::new(RemoteRepositoryCache::open(
                config.clone(),
                self.reader.clone(),
                self.trust_chain.clone(),
                &self.client_options,
            )?)),
        }
    }
}
