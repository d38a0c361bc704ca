//! Artifact location, naming and publishing
//!
//! Every build recipe writes its binary to the same path under the output
//! mount. The published name is derived from the product and platform id,
//! so distinct platforms can never collide.

use crate::build::{BuildJob, JobStatus};
use crate::error::{MatrixError, MatrixResult};
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// External name for a platform's artifact, e.g. `worker-linux-x86_64-distroA`
pub fn artifact_name(product: &str, os_family: &str, platform_id: &str) -> String {
    format!("{}-{}-{}", product, os_family, platform_id)
}

/// Find the artifact a build wrote into its output directory.
///
/// An empty file counts as missing: the recipe exited 0 without producing
/// a usable binary.
pub async fn locate(output_dir: &Path, artifact_path: &str) -> MatrixResult<PathBuf> {
    let path = output_dir.join(artifact_path);

    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            debug!("Located artifact {} ({} bytes)", path.display(), meta.len());
            Ok(path)
        }
        _ => Err(MatrixError::ArtifactMissing(path)),
    }
}

/// Where a published artifact ended up
#[derive(Debug, Clone, Serialize)]
pub struct PublishedArtifact {
    pub name: String,
    pub location: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Publishing outcome for one succeeded job
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishOutcome {
    Published(PublishedArtifact),
    Failed { name: String, reason: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }
}

/// Receives finished binaries under their external names.
///
/// Concurrent accepts for distinct names must not interfere.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `name`, returning a human-readable location
    async fn accept(&self, name: &str, bytes: Vec<u8>) -> MatrixResult<String>;
}

/// Sink writing artifacts (plus `.sha256` sidecars) into a directory
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> MatrixResult<PathBuf> {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| MatrixError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &target)
            .await
            .map_err(|e| MatrixError::io(format!("renaming to {}", target.display()), e))?;

        Ok(target)
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn accept(&self, name: &str, bytes: Vec<u8>) -> MatrixResult<String> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MatrixError::io(format!("creating {}", self.dir.display()), e))?;

        let checksum = format!("{}  {}\n", hex::encode(Sha256::digest(&bytes)), name);
        let target = self.write_atomic(name, &bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| MatrixError::io("setting artifact permissions", e))?;
        }

        self.write_atomic(&format!("{}.sha256", name), checksum.as_bytes())
            .await?;

        Ok(target.display().to_string())
    }
}

/// Locates succeeded jobs' artifacts and hands them to the sink
pub struct Publisher {
    product: String,
    os_family: String,
    sink: Arc<dyn ArtifactSink>,
}

impl Publisher {
    pub fn new(
        product: impl Into<String>,
        os_family: impl Into<String>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            product: product.into(),
            os_family: os_family.into(),
            sink,
        }
    }

    pub fn name_for(&self, platform_id: &str) -> String {
        artifact_name(&self.product, &self.os_family, platform_id)
    }

    /// Publish the artifact of a succeeded job
    pub async fn locate_and_publish(&self, job: &BuildJob) -> MatrixResult<PublishedArtifact> {
        if job.status() != JobStatus::Succeeded {
            return Err(MatrixError::Internal(format!(
                "cannot publish {} job {}",
                job.status(),
                job.id()
            )));
        }

        let path = job
            .artifact_path()
            .ok_or_else(|| MatrixError::Internal(format!("job {} has no artifact", job.id())))?;
        let bytes = match fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(MatrixError::ArtifactMissing(path.to_path_buf())),
        };

        let name = self.name_for(job.id());
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size_bytes = bytes.len() as u64;

        let location = self
            .sink
            .accept(&name, bytes)
            .await
            .map_err(|e| MatrixError::Publish {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        info!("Published {} to {}", name, location);
        Ok(PublishedArtifact {
            name,
            location,
            sha256,
            size_bytes,
        })
    }

    /// Publish and fold any error into a reportable outcome
    pub async fn publish(&self, job: &BuildJob) -> PublishOutcome {
        match self.locate_and_publish(job).await {
            Ok(artifact) => PublishOutcome::Published(artifact),
            Err(e) => PublishOutcome::Failed {
                name: self.name_for(job.id()),
                reason: e.to_string(),
            },
        }
    }
}
