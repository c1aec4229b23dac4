//! Versioned offline asset cache
//!
//! Lifecycle mirrors an installable web app: `install()` pre-populates the
//! cache named by the version tag from the manifest, `activate()` removes
//! every other version, and `fetch()` serves requests with a strategy
//! chosen by request kind:
//!
//! - audio: cache first, network fallback, fetched bytes stored
//! - static: stale-while-revalidate (cached copy now, refresh in background)
//! - navigation: network first, cached app shell when offline

use super::fetch::{strip_query, BundleDirectory, HttpNetwork, Network};
use super::store::{CacheStorage, NamedCache};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use chrono::Utc;
use petcalm_common::{AudioEvent, EventBus};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".ogg", ".wav", ".m4a", ".flac"];

/// How a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Audio,
    Navigation,
    Static,
}

impl RequestKind {
    /// Classify a non-navigation request by path extension or host
    pub fn classify(url: &str, audio_hosts: &[String]) -> Self {
        let (host, path) = split_url(url);
        let path = path.to_ascii_lowercase();

        let audio_path = AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
        let audio_host = host.map_or(false, |h| audio_hosts.iter().any(|a| h.contains(a.as_str())));

        if audio_path || audio_host {
            RequestKind::Audio
        } else {
            RequestKind::Static
        }
    }
}

/// Split an absolute URL into (host, path); relative paths have no host
fn split_url(url: &str) -> (Option<&str>, &str) {
    let url = strip_query(url);
    let Some((_, rest)) = url.split_once("://") else {
        return (None, url);
    };
    match rest.find('/') {
        Some(slash) => (Some(&rest[..slash]), &rest[slash..]),
        None => (Some(rest), "/"),
    }
}

pub struct OfflineAssetCache {
    storage: CacheStorage,
    network: Arc<dyn Network>,
    config: CacheConfig,
    events: EventBus,
    revalidations: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineAssetCache {
    /// `events` receives `CacheInstalled`/`CacheActivated`; an engine built on
    /// this cache publishes on the same bus
    pub fn new(
        storage: CacheStorage,
        network: Arc<dyn Network>,
        config: CacheConfig,
        events: EventBus,
    ) -> Self {
        Self {
            storage,
            network,
            config,
            events,
            revalidations: Mutex::new(Vec::new()),
        }
    }

    /// Cache under `<root>/cache`, fetching from the bundle directory when
    /// one is configured and over HTTP otherwise
    pub fn from_config(config: &CacheConfig, root: &Path, events: EventBus) -> Result<Self> {
        let network: Arc<dyn Network> = match &config.bundle_dir {
            Some(dir) => {
                info!("Offline cache backed by bundle directory {}", dir.display());
                Arc::new(BundleDirectory::new(dir))
            }
            None => Arc::new(HttpNetwork::new(config.base_url.clone())?),
        };
        let storage = CacheStorage::new(root.join("cache"));
        Ok(Self::new(storage, network, config.clone(), events))
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }

    async fn current(&self) -> Result<NamedCache> {
        self.storage.open(&self.config.version).await
    }

    /// Populate the current version from the manifest
    ///
    /// All or nothing: the manifest is fetched into a staging cache that
    /// replaces the current version only once complete. On any failure the
    /// staging cache is removed, an already installed version is left as it
    /// was, and `ResourceUnavailable` is returned.
    pub async fn install(&self) -> Result<usize> {
        let version = self.config.version.clone();
        let staging = format!("{}.installing", version);
        info!("Installing offline cache {} ({} assets)", version, self.config.manifest.len());

        match self.populate(&staging).await {
            Ok(count) => {
                info!("Offline cache {} installed", version);
                self.events.emit_lossy(AudioEvent::CacheInstalled {
                    version,
                    assets: count,
                    timestamp: Utc::now(),
                });
                Ok(count)
            }
            Err(e) => {
                warn!("Install of {} failed, rolling back: {}", version, e);
                if let Err(cleanup) = self.storage.delete_cache(&staging).await {
                    warn!("Rollback of {} failed: {}", version, cleanup);
                }
                Err(match e {
                    Error::ResourceUnavailable { .. } => e,
                    other => Error::ResourceUnavailable {
                        url: version,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    async fn populate(&self, staging: &str) -> Result<usize> {
        self.storage.delete_cache(staging).await?;
        let cache = self.storage.open(staging).await?;
        for path in &self.config.manifest {
            let asset = self.network.fetch(path).await?;
            cache
                .put(path, &asset.bytes, asset.content_type.as_deref())
                .await?;
        }
        self.storage.promote(staging, &self.config.version).await?;
        Ok(self.config.manifest.len())
    }

    /// Delete every cache except the current version; returns deleted names
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.list_names().await? {
            if name != self.config.version && self.storage.delete_cache(&name).await? {
                info!("Deleted stale cache {}", name);
                deleted.push(name);
            }
        }

        self.events.emit_lossy(AudioEvent::CacheActivated {
            version: self.config.version.clone(),
            deleted: deleted.clone(),
            timestamp: Utc::now(),
        });
        Ok(deleted)
    }

    /// Serve a non-navigation request
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match RequestKind::classify(url, &self.config.audio_hosts) {
            RequestKind::Audio => self.fetch_cache_first(url).await,
            _ => self.fetch_stale_while_revalidate(url).await,
        }
    }

    /// Serve a navigation request, falling back to the app shell offline
    pub async fn fetch_navigation(&self, url: &str) -> Result<Vec<u8>> {
        match self.network.fetch(url).await {
            Ok(asset) => Ok(asset.bytes),
            Err(e) => {
                debug!("Navigation to {} failed ({}), trying cached shell", url, e);
                let cache = self.current().await?;
                match cache.get(&self.config.shell_path).await? {
                    Some(shell) => Ok(shell.bytes),
                    None => Err(e),
                }
            }
        }
    }

    async fn fetch_cache_first(&self, url: &str) -> Result<Vec<u8>> {
        let cache = self.current().await?;
        if let Some(entry) = cache.get(url).await? {
            debug!("Cache hit for {}", url);
            return Ok(entry.bytes);
        }

        let asset = self.network.fetch(url).await?;
        if let Err(e) = cache
            .put(url, &asset.bytes, asset.content_type.as_deref())
            .await
        {
            warn!("Could not cache {}: {}", url, e);
        }
        Ok(asset.bytes)
    }

    async fn fetch_stale_while_revalidate(&self, url: &str) -> Result<Vec<u8>> {
        let cache = self.current().await?;
        match cache.get(url).await? {
            Some(entry) => {
                self.spawn_revalidation(cache, url.to_string());
                Ok(entry.bytes)
            }
            None => {
                let asset = self.network.fetch(url).await?;
                if let Err(e) = cache
                    .put(url, &asset.bytes, asset.content_type.as_deref())
                    .await
                {
                    warn!("Could not cache {}: {}", url, e);
                }
                Ok(asset.bytes)
            }
        }
    }

    fn spawn_revalidation(&self, cache: NamedCache, url: String) {
        let network = Arc::clone(&self.network);
        let handle = tokio::spawn(async move {
            match network.fetch(&url).await {
                Ok(asset) => {
                    if let Err(e) = cache
                        .put(&url, &asset.bytes, asset.content_type.as_deref())
                        .await
                    {
                        warn!("Revalidation store of {} failed: {}", url, e);
                    }
                }
                Err(e) => debug!("Revalidation of {} skipped: {}", url, e),
            }
        });

        let mut pending = self
            .revalidations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for background revalidations started so far
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = {
            let mut guard = self
                .revalidations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.drain(..).collect()
        };
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Revalidation task failed: {}", e);
            }
        }
    }
}
