//! Build job state
//!
//! A job moves `pending → running → succeeded | failed` (or straight from
//! `pending` to `failed`) and never leaves a terminal status.

use crate::cache::CacheKey;
use crate::error::{MatrixError, MatrixResult};
use crate::platform::PlatformDescriptor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Cache key could not be computed
    Resolution,
    /// Image build or recipe exited non-zero
    Build,
    /// Wall-clock limit exceeded
    Timeout,
    /// Recipe exited 0 without producing the artifact
    ArtifactMissing,
    /// Container engine or host failure
    Runtime,
}

impl FailureKind {
    /// Classify the error that ended a build
    pub fn of(error: &MatrixError) -> Self {
        match error {
            MatrixError::Resolution { .. } => Self::Resolution,
            MatrixError::BuildFailed { .. }
            | MatrixError::ImageBuild { .. }
            | MatrixError::ContainerStart(_) => Self::Build,
            MatrixError::Timeout { .. } => Self::Timeout,
            MatrixError::ArtifactMissing(_) => Self::ArtifactMissing,
            _ => Self::Runtime,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolution => "resolution",
            Self::Build => "build",
            Self::Timeout => "timeout",
            Self::ArtifactMissing => "artifact missing",
            Self::Runtime => "runtime",
        };
        write!(f, "{}", name)
    }
}

/// Failure details attached to a failed job
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub diagnostic: String,
}

impl JobFailure {
    /// Build the failure record for an error, including the captured log tail
    pub fn from_error(error: &MatrixError) -> Self {
        let diagnostic = match error {
            MatrixError::BuildFailed { output, .. } if !output.is_empty() => {
                format!("{}\n{}", error, output)
            }
            _ => error.to_string(),
        };

        Self {
            kind: FailureKind::of(error),
            diagnostic,
        }
    }
}

/// One platform build within a run
#[derive(Debug, Clone, Serialize)]
pub struct BuildJob {
    pub descriptor: PlatformDescriptor,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_key: Option<CacheKey>,
    cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl BuildJob {
    /// Create a pending job for a descriptor
    pub fn new(descriptor: PlatformDescriptor) -> Self {
        Self {
            descriptor,
            status: JobStatus::Pending,
            artifact_path: None,
            failure: None,
            cache_key: None,
            cache_hit: false,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Set only when the job succeeded
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Set only when the job failed
    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.diagnostic.as_str())
    }

    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Wall-clock duration, once the job has finished
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    fn invalid(&self, to: JobStatus) -> MatrixError {
        MatrixError::InvalidTransition {
            platform: self.descriptor.id.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// `pending → running`
    pub fn start(&mut self) -> MatrixResult<()> {
        if self.status != JobStatus::Pending {
            return Err(self.invalid(JobStatus::Running));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Record the cache decision made for this job
    pub fn record_cache(&mut self, key: CacheKey, hit: bool) {
        self.cache_key = Some(key);
        self.cache_hit = hit;
    }

    /// `running → succeeded`
    pub fn succeed(&mut self, artifact_path: PathBuf) -> MatrixResult<()> {
        if self.status != JobStatus::Running {
            return Err(self.invalid(JobStatus::Succeeded));
        }
        self.status = JobStatus::Succeeded;
        self.artifact_path = Some(artifact_path);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `pending | running → failed`
    pub fn fail(&mut self, failure: JobFailure) -> MatrixResult<()> {
        if self.status.is_terminal() {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.failure = Some(failure);
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
