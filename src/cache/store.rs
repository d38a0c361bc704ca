//! Layer cache stores
//!
//! A store keeps at most one entry per platform id. An entry is only
//! handed out when its recorded key equals the freshly resolved key, so
//! editing an image definition or recipe turns the entry into a miss.

use crate::cache::key::CacheKey;
use crate::error::{MatrixError, MatrixResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const ENTRY_FILE: &str = "entry.json";
const PAYLOAD_FILE: &str = "layer.tar";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Metadata recorded alongside a cached layer payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub platform_id: String,
    pub key: CacheKey,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheEntry {
    /// Check if this entry is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }
}

/// A valid cache hit: metadata plus the payload archive on disk
#[derive(Debug, Clone)]
pub struct CachedLayer {
    pub entry: CacheEntry,
    pub payload: PathBuf,
}

/// Key → payload store, scoped per platform id
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return the entry for `platform_id` if its key matches `key`
    async fn lookup(&self, platform_id: &str, key: &CacheKey) -> MatrixResult<Option<CachedLayer>>;

    /// Record `payload` as the layer for `platform_id` under `key`,
    /// replacing any previous entry for that platform
    async fn store(&self, platform_id: &str, key: &CacheKey, payload: &Path)
        -> MatrixResult<CacheEntry>;

    /// All entries currently held
    async fn list(&self) -> MatrixResult<Vec<CacheEntry>>;

    /// Remove the entry for a platform; returns whether one existed
    async fn remove(&self, platform_id: &str) -> MatrixResult<bool>;
}

/// Cache store backed by a directory tree: `{root}/{platform_id}/{entry.json,layer.tar}`
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry directory for a platform; the id must name a direct child of the root
    fn platform_dir(&self, platform_id: &str) -> MatrixResult<PathBuf> {
        let mut components = Path::new(platform_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(platform_id)),
            _ => Err(MatrixError::InvalidPlatformId {
                id: platform_id.to_string(),
                reason: "not usable as a cache directory name".to_string(),
            }),
        }
    }

    async fn read_entry(&self, platform_id: &str) -> MatrixResult<Option<CacheEntry>> {
        let path = self.platform_dir(platform_id)?.join(ENTRY_FILE);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MatrixError::io(
                    format!("reading cache entry {}", path.display()),
                    e,
                ))
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| MatrixError::CacheCorrupt {
                id: platform_id.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn lookup(&self, platform_id: &str, key: &CacheKey) -> MatrixResult<Option<CachedLayer>> {
        let entry = match self.read_entry(platform_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss for {}: no entry", platform_id);
                return Ok(None);
            }
            Err(MatrixError::CacheCorrupt { id, reason }) => {
                warn!("Ignoring corrupt cache entry for {}: {}", id, reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if &entry.key != key {
            debug!(
                "Cache miss for {}: stored key {} is stale (current {})",
                platform_id,
                entry.key.short(),
                key.short()
            );
            return Ok(None);
        }

        let payload = self.platform_dir(platform_id)?.join(PAYLOAD_FILE);
        if !payload.is_file() {
            warn!("Cache entry for {} has no payload", platform_id);
            return Ok(None);
        }

        debug!("Cache hit for {}: {}", platform_id, key.short());
        Ok(Some(CachedLayer { entry, payload }))
    }

    async fn store(
        &self,
        platform_id: &str,
        key: &CacheKey,
        payload: &Path,
    ) -> MatrixResult<CacheEntry> {
        let dir = self.platform_dir(platform_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MatrixError::io(format!("creating cache dir {}", dir.display()), e))?;

        let entry_path = dir.join(ENTRY_FILE);
        let payload_path = dir.join(PAYLOAD_FILE);

        // Drop the old entry first so a reader never pairs it with the new payload
        match fs::remove_file(&entry_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MatrixError::io("removing stale cache entry", e)),
        }

        let tmp_payload = dir.join(format!("{}.tmp", PAYLOAD_FILE));
        let size_bytes = fs::copy(payload, &tmp_payload)
            .await
            .map_err(|e| MatrixError::io(format!("copying {}", payload.display()), e))?;
        fs::rename(&tmp_payload, &payload_path)
            .await
            .map_err(|e| MatrixError::io("finalizing cache payload", e))?;

        let entry = CacheEntry {
            platform_id: platform_id.to_string(),
            key: key.clone(),
            created_at: Utc::now(),
            size_bytes,
        };

        let tmp_entry = dir.join(format!("{}.tmp", ENTRY_FILE));
        fs::write(&tmp_entry, serde_json::to_string_pretty(&entry)?)
            .await
            .map_err(|e| MatrixError::io("writing cache entry", e))?;
        fs::rename(&tmp_entry, &entry_path)
            .await
            .map_err(|e| MatrixError::io("finalizing cache entry", e))?;

        debug!(
            "Stored cache for {}: {} ({})",
            platform_id,
            key.short(),
            format_bytes(size_bytes)
        );
        Ok(entry)
    }

    async fn list(&self) -> MatrixResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(MatrixError::io("listing cache directory", e)),
        };

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| MatrixError::io("listing cache directory", e))?
        {
            let Some(platform_id) = item.file_name().to_str().map(String::from) else {
                continue;
            };
            match self.read_entry(&platform_id).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Skipping cache entry {}: {}", platform_id, e),
            }
        }

        entries.sort_by(|a, b| a.platform_id.cmp(&b.platform_id));
        Ok(entries)
    }

    async fn remove(&self, platform_id: &str) -> MatrixResult<bool> {
        let dir = self.platform_dir(platform_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MatrixError::io(
                format!("removing cache dir {}", dir.display()),
                e,
            )),
        }
    }
}
