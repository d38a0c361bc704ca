//! Matrix orchestrator
//!
//! Fans a registry out into one build job per platform, runs them as
//! independent tasks, publishes every succeeded artifact and joins the
//! terminal states into a single `RunResult`.

use crate::artifact::{PublishOutcome, Publisher};
use crate::build::{BuildExecutor, BuildJob, FailureKind, JobFailure, JobStatus};
use crate::cache::CacheStore;
use crate::platform::{PlatformDescriptor, PlatformRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Aggregate status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal job plus the publish outcome of its artifact
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: BuildJob,
    /// Present only for succeeded jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutcome>,
}

/// Result of one full run, jobs in declaration order
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub matrix: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl RunResult {
    fn new(
        run_id: Uuid,
        matrix: String,
        started_at: DateTime<Utc>,
        jobs: Vec<JobReport>,
    ) -> Self {
        let status = if jobs.iter().all(|r| r.job.status() == JobStatus::Succeeded) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        Self {
            run_id,
            matrix,
            status,
            started_at,
            finished_at: Utc::now(),
            jobs,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &BuildJob> {
        self.jobs
            .iter()
            .map(|r| &r.job)
            .filter(|j| j.status() == JobStatus::Failed)
    }

    /// Publish outcomes that did not reach the sink
    pub fn publish_failures(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.jobs
            .iter()
            .filter_map(|r| r.publish.as_ref())
            .filter(|p| !p.is_published())
    }

    /// Every build succeeded and every artifact was published
    pub fn is_clean(&self) -> bool {
        self.succeeded() && self.publish_failures().next().is_none()
    }

    pub fn cache_hits(&self) -> usize {
        self.jobs.iter().filter(|r| r.job.cache_hit()).count()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs every platform of a registry and aggregates the outcome
pub struct MatrixOrchestrator {
    run_id: Uuid,
    matrix: String,
    executor: Arc<BuildExecutor>,
    publisher: Arc<Publisher>,
    cache: Option<Arc<dyn CacheStore>>,
    max_parallel: usize,
}

impl MatrixOrchestrator {
    pub fn new(
        run_id: Uuid,
        matrix: impl Into<String>,
        executor: BuildExecutor,
        publisher: Publisher,
    ) -> Self {
        Self {
            run_id,
            matrix: matrix.into(),
            executor: Arc::new(executor),
            publisher: Arc::new(publisher),
            cache: None,
            max_parallel: 0,
        }
    }

    /// Use a cache store for layer reuse
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Limit concurrently running jobs; 0 means unbounded
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Run every descriptor to a terminal state.
    ///
    /// A failing or panicking job never cancels its siblings.
    pub async fn run(&self, registry: &PlatformRegistry) -> RunResult {
        let started_at = Utc::now();
        let descriptors = registry.descriptors();
        info!(
            "Run {} of matrix '{}': {} platform(s)",
            self.run_id,
            self.matrix,
            descriptors.len()
        );

        let semaphore = match self.max_parallel {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let mut join_set = JoinSet::new();
        let mut task_index = HashMap::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let job = BuildJob::new(descriptor.clone());
            let executor = self.executor.clone();
            let publisher = self.publisher.clone();
            let cache = self.cache.clone();
            let semaphore = semaphore.clone();

            let handle = join_set.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it were
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let job = executor.execute(job, cache.as_deref()).await;
                let publish = match job.status() {
                    JobStatus::Succeeded => Some(publisher.publish(&job).await),
                    _ => None,
                };

                JobReport { job, publish }
            });
            task_index.insert(handle.id(), index);
        }

        let mut reports: Vec<Option<JobReport>> = vec![None; descriptors.len()];

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, report)) => {
                    if let Some(&index) = task_index.get(&id) {
                        debug!("{} finished: {}", report.job.id(), report.job.status());
                        reports[index] = Some(report);
                    }
                }
                Err(e) => {
                    let Some(&index) = task_index.get(&e.id()) else {
                        error!("Untracked build task failed: {}", e);
                        continue;
                    };
                    error!("Build task for {} aborted: {}", descriptors[index].id, e);
                    reports[index] = Some(self.aborted_report(&descriptors[index], &e));
                }
            }
        }

        let jobs = reports.into_iter().flatten().collect();
        let result = RunResult::new(self.run_id, self.matrix.clone(), started_at, jobs);
        info!("Run {} {}", result.run_id, result.status);
        result
    }

    /// Failed report for a descriptor whose task never returned
    fn aborted_report(&self, descriptor: &PlatformDescriptor, error: &tokio::task::JoinError) -> JobReport {
        let mut job = BuildJob::new(descriptor.clone());
        let failure = JobFailure {
            kind: FailureKind::Runtime,
            diagnostic: format!("build task aborted: {}", error),
        };
        if let Err(e) = job.fail(failure) {
            error!("{}", e);
        }
        self.executor.observer().job_finished(&job);
        JobReport { job, publish: None }
    }
}
