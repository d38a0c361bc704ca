//! Content-addressed cache keys
//!
//! A platform's cache key is the SHA256 of its image definition and build
//! recipe contents. Same bytes = same key, across runs and machines.

use crate::error::{MatrixError, MatrixResult};
use crate::platform::PlatformDescriptor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Hex-encoded SHA256 digest identifying a build layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an existing hex digest (e.g. one read back from a cache store)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, used in image tags and for display
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

async fn read_input(path: &Path) -> MatrixResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| MatrixError::Resolution {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Feed one tagged, length-prefixed input into the hasher.
///
/// Without the prefix, moving bytes from the end of one file to the start
/// of the other would keep the digest unchanged.
fn update_tagged(hasher: &mut Sha256, tag: &[u8], contents: &[u8]) {
    hasher.update(tag);
    hasher.update((contents.len() as u64).to_le_bytes());
    hasher.update(contents);
}

/// Compute the cache key for a descriptor from its image definition and recipe
pub async fn resolve(descriptor: &PlatformDescriptor) -> MatrixResult<CacheKey> {
    let image = read_input(&descriptor.image_definition_path).await?;
    let recipe = read_input(&descriptor.build_recipe_path).await?;

    let mut hasher = Sha256::new();
    update_tagged(&mut hasher, b"image-definition", &image);
    update_tagged(&mut hasher, b"build-recipe", &recipe);

    let key = CacheKey(hex::encode(hasher.finalize()));
    debug!("Cache key for {}: {}", descriptor.id, key.short());
    Ok(key)
}
