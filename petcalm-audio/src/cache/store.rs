//! On-disk named cache storage
//!
//! Layout: `<root>/<cache name>/<sha256(key)>.bin` holds the body and a
//! sibling `.json` holds `EntryMeta`. Both files are written under a unique
//! temporary name and renamed into place, so readers never see a partial
//! file and concurrent writers of one key never share a temp file.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Metadata stored beside every cached body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Request key the entry was stored under
    pub key: String,
    pub content_type: Option<String>,
    pub size: u64,
    /// Hex SHA-256 of the body
    pub sha256: String,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub meta: EntryMeta,
    pub bytes: Vec<u8>,
}

fn hex_digest(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::Cache(format!("Invalid cache name: {:?}", name)));
    }
    Ok(())
}

/// Root directory holding one directory per named cache
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (creating if needed) the cache called `name`
    pub async fn open(&self, name: &str) -> Result<NamedCache> {
        validate_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).await?;
        Ok(NamedCache {
            name: name.to_string(),
            dir,
        })
    }

    pub async fn has_cache(&self, name: &str) -> bool {
        validate_name(name).is_ok() && fs::metadata(self.root.join(name)).await.is_ok_and(|m| m.is_dir())
    }

    /// Names of all caches under the root, sorted
    pub async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a whole cache; returns false if it did not exist
    pub async fn delete_cache(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        match fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => {
                debug!("Deleted cache {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the cache `staging` into place as `name`
    ///
    /// An existing `name` is set aside first and restored if the move fails,
    /// so `name` is only ever replaced by a complete cache.
    pub async fn promote(&self, staging: &str, name: &str) -> Result<()> {
        validate_name(staging)?;
        validate_name(name)?;
        let target = self.root.join(name);
        let retired = self.root.join(format!("{}.retired", name));

        remove_dir_if_present(&retired).await?;
        let had_previous = match fs::rename(&target, &retired).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = fs::rename(self.root.join(staging), &target).await {
            if had_previous {
                if let Err(restore) = fs::rename(&retired, &target).await {
                    warn!("Could not restore cache {}: {}", name, restore);
                }
            }
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = remove_dir_if_present(&retired).await {
                warn!("Could not remove retired copy of {}: {}", name, e);
            }
        }
        debug!("Promoted cache {} to {}", staging, name);
        Ok(())
    }
}

async fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to `path` through a uniquely named sibling temp file
async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp_path, bytes).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// One named cache
#[derive(Debug, Clone)]
pub struct NamedCache {
    name: String,
    dir: PathBuf,
}

impl NamedCache {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let stem = hex_digest(key.as_bytes());
        (
            self.dir.join(format!("{}.bin", stem)),
            self.dir.join(format!("{}.json", stem)),
        )
    }

    /// Store `bytes` under `key`, replacing any existing entry
    pub async fn put(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<EntryMeta> {
        let (body_path, meta_path) = self.paths(key);
        let meta = EntryMeta {
            key: key.to_string(),
            content_type: content_type.map(str::to_string),
            size: bytes.len() as u64,
            sha256: hex_digest(bytes),
            stored_at: Utc::now(),
        };

        write_replacing(&body_path, bytes).await?;

        let json = serde_json::to_vec_pretty(&meta).map_err(petcalm_common::Error::from)?;
        write_replacing(&meta_path, &json).await?;

        debug!("Cached {} in {} ({} bytes)", key, self.name, meta.size);
        Ok(meta)
    }

    /// Look up `key`; entries that fail their digest check are treated as missing
    pub async fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
        let (body_path, meta_path) = self.paths(key);

        let meta_json = match fs::read(&meta_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_json).map_err(petcalm_common::Error::from)?;

        let bytes = match fs::read(&body_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if meta.key != key || meta.sha256 != hex_digest(&bytes) {
            warn!("Cache entry for {} in {} is corrupt, ignoring", key, self.name);
            return Ok(None);
        }

        Ok(Some(CachedEntry { meta, bytes }))
    }

    pub async fn contains(&self, key: &str) -> bool {
        let (_, meta_path) = self.paths(key);
        fs::metadata(meta_path).await.is_ok()
    }

    /// Keys of every stored entry, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = fs::read(&path).await?;
            match serde_json::from_slice::<EntryMeta>(&json) {
                Ok(meta) => keys.push(meta.key),
                Err(e) => warn!("Skipping unreadable metadata {}: {}", path.display(), e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
