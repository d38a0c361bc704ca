//! Build executor
//!
//! Runs one platform's containerized build to completion:
//! resolve the cache key, seed the image from cache or build it, run the
//! recipe, verify the artifact, then store the image layers for next time.

use crate::artifact;
use crate::build::job::{BuildJob, JobFailure};
use crate::build::observer::{NoopObserver, RunObserver};
use crate::cache::{self, CacheKey, CacheStore};
use crate::error::{MatrixError, MatrixResult};
use crate::orchestration::{build_error_output, ContainerConfig, ContainerRuntime, ImageBuild, Mount};
use crate::platform::PlatformDescriptor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source tree mount point inside build containers
pub const WORKSPACE_MOUNT: &str = "/workspace";
/// Output directory mount point inside build containers
pub const OUTPUT_MOUNT: &str = "/out";
/// Directory holding the read-only build recipe
pub const RECIPE_MOUNT_DIR: &str = "/recipe";

/// Settings shared by every job in a run
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Short run identifier used in container names
    pub run_id: String,
    /// OS family passed to `--platform`
    pub os_family: String,
    /// Artifact location relative to the output mount
    pub artifact_path: String,
    /// Source tree mounted read/write into each container
    pub source_root: PathBuf,
    /// Scratch directory for this run; each job gets `{work_dir}/{platform_id}`
    pub work_dir: PathBuf,
    /// Wall-clock limit per job
    pub timeout: Duration,
}

/// What a finished build leaves behind for the caching step
struct BuiltImage {
    artifact: PathBuf,
    key: CacheKey,
    tag: String,
    job_dir: PathBuf,
    seeded_from_cache: bool,
}

/// Executes platform builds against a container runtime
pub struct BuildExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    settings: ExecutorSettings,
    observer: Arc<dyn RunObserver>,
}

impl BuildExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: ExecutorSettings) -> Self {
        Self {
            runtime,
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn observer(&self) -> &Arc<dyn RunObserver> {
        &self.observer
    }

    /// Image tag for a platform at a cache key; image references must be lowercase
    pub fn image_tag(descriptor: &PlatformDescriptor, key: &CacheKey) -> String {
        format!(
            "relmatrix/{}:{}",
            descriptor.id.to_ascii_lowercase(),
            key.short()
        )
    }

    pub fn container_name(&self, descriptor: &PlatformDescriptor) -> String {
        format!("relmatrix-{}-{}", self.settings.run_id, descriptor.id)
    }

    fn target_platform(&self, descriptor: &PlatformDescriptor) -> String {
        format!("{}/{}", self.settings.os_family, descriptor.architecture)
    }

    /// Drive a pending job to a terminal status.
    ///
    /// Never returns an error: every failure is recorded on the job.
    pub async fn execute(&self, mut job: BuildJob, cache: Option<&dyn CacheStore>) -> BuildJob {
        if let Err(e) = job.start() {
            warn!("Not executing {}: {}", job.id(), e);
            return job;
        }

        let descriptor = job.descriptor.clone();
        self.observer.job_started(&descriptor.id);
        info!("Building {}", descriptor);

        let outcome =
            tokio::time::timeout(self.settings.timeout, self.build(&descriptor, &mut job, cache))
                .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                let name = self.container_name(&descriptor);
                if let Err(e) = self.runtime.remove(&name).await {
                    warn!("Failed to remove timed out container {}: {}", name, e);
                }
                Err(MatrixError::Timeout {
                    platform: descriptor.id.clone(),
                    after: self.settings.timeout,
                })
            }
        };

        match result {
            Ok(built) => {
                info!("{} succeeded", descriptor.id);
                if let Err(e) = job.succeed(built.artifact.clone()) {
                    warn!("{}", e);
                }
                if !built.seeded_from_cache {
                    if let Some(store) = cache {
                        self.store_layer(store, &descriptor, &built).await;
                    }
                }
            }
            Err(e) => {
                warn!("{} failed: {}", descriptor.id, e);
                if let Err(e) = job.fail(JobFailure::from_error(&e)) {
                    warn!("{}", e);
                }
            }
        }

        self.observer.job_finished(&job);
        job
    }

    async fn build(
        &self,
        descriptor: &PlatformDescriptor,
        job: &mut BuildJob,
        cache: Option<&dyn CacheStore>,
    ) -> MatrixResult<BuiltImage> {
        let key = cache::resolve(descriptor).await?;
        let tag = Self::image_tag(descriptor, &key);
        let on_output = |line: String| self.observer.job_output(&descriptor.id, &line);

        let seeded_from_cache = match cache {
            Some(store) => self.seed_from_cache(store, descriptor, &key).await,
            None => false,
        };
        job.record_cache(key.clone(), seeded_from_cache);

        if !seeded_from_cache && !self.runtime.image_exists(&tag).await? {
            let build = ImageBuild {
                tag: tag.clone(),
                definition: descriptor.image_definition_path.clone(),
                context: descriptor
                    .image_definition_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
                platform: self.target_platform(descriptor),
            };
            self.runtime.build_image(&build, &on_output).await?;
        }

        let job_dir = self.settings.work_dir.join(&descriptor.id);
        let out_dir = job_dir.join("out");
        // A leftover artifact must never satisfy this run's check
        if out_dir.exists() {
            tokio::fs::remove_dir_all(&out_dir)
                .await
                .map_err(|e| MatrixError::io(format!("clearing {}", out_dir.display()), e))?;
        }
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| MatrixError::io(format!("creating {}", out_dir.display()), e))?;

        let (config, command) = self.container_config(descriptor, &tag, &out_dir)?;
        let exit = self
            .runtime
            .run_to_completion(&config, &command, &on_output)
            .await?;

        if !exit.success() {
            return Err(MatrixError::BuildFailed {
                platform: descriptor.id.clone(),
                code: exit.code,
                output: build_error_output(&exit.output),
            });
        }

        let artifact = artifact::locate(&out_dir, &self.settings.artifact_path).await?;

        Ok(BuiltImage {
            artifact,
            key,
            tag,
            job_dir,
            seeded_from_cache,
        })
    }

    /// Load the cached image for this key, if any. Cache problems are never fatal.
    async fn seed_from_cache(
        &self,
        store: &dyn CacheStore,
        descriptor: &PlatformDescriptor,
        key: &CacheKey,
    ) -> bool {
        let layer = match store.lookup(&descriptor.id, key).await {
            Ok(Some(layer)) => layer,
            Ok(None) => return false,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", descriptor.id, e);
                return false;
            }
        };

        match self.runtime.load_image(&layer.payload).await {
            Ok(()) => {
                info!("Seeded {} from cache ({})", descriptor.id, key.short());
                true
            }
            Err(e) => {
                warn!("Failed to load cached layer for {}: {}", descriptor.id, e);
                false
            }
        }
    }

    /// Save the freshly built image into the cache. Best-effort.
    async fn store_layer(
        &self,
        store: &dyn CacheStore,
        descriptor: &PlatformDescriptor,
        built: &BuiltImage,
    ) {
        let archive = built.job_dir.join("layer.tar");

        let result = async {
            self.runtime.save_image(&built.tag, &archive).await?;
            store.store(&descriptor.id, &built.key, &archive).await
        }
        .await;

        match result {
            Ok(entry) => debug!(
                "Cached {} at {}",
                descriptor.id,
                cache::format_bytes(entry.size_bytes)
            ),
            Err(e) => warn!("Failed to cache layer for {}: {}", descriptor.id, e),
        }

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            debug!("Could not remove {}: {}", archive.display(), e);
        }
    }

    fn container_config(
        &self,
        descriptor: &PlatformDescriptor,
        tag: &str,
        out_dir: &Path,
    ) -> MatrixResult<(ContainerConfig, Vec<String>)> {
        let recipe_name = descriptor
            .build_recipe_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MatrixError::Internal(format!(
                    "build recipe path has no file name: {}",
                    descriptor.build_recipe_path.display()
                ))
            })?;
        let recipe_in_container = format!("{}/{}", RECIPE_MOUNT_DIR, recipe_name);

        let mut env = BTreeMap::new();
        env.insert("RELMATRIX_PLATFORM".to_string(), descriptor.id.clone());
        env.insert("RELMATRIX_OS_FLAVOR".to_string(), descriptor.os_flavor.clone());
        env.insert("RELMATRIX_ARCH".to_string(), descriptor.architecture.clone());
        env.insert("RELMATRIX_OUT".to_string(), OUTPUT_MOUNT.to_string());
        env.insert(
            "RELMATRIX_ARTIFACT".to_string(),
            format!("{}/{}", OUTPUT_MOUNT, self.settings.artifact_path),
        );

        let config = ContainerConfig {
            name: self.container_name(descriptor),
            image: tag.to_string(),
            platform: self.target_platform(descriptor),
            workdir: WORKSPACE_MOUNT.to_string(),
            mounts: vec![
                Mount::read_write(&self.settings.source_root, WORKSPACE_MOUNT),
                Mount::read_only(&descriptor.build_recipe_path, recipe_in_container.clone()),
                Mount::read_write(out_dir, OUTPUT_MOUNT),
            ],
            env,
        };

        Ok((config, vec!["/bin/sh".to_string(), recipe_in_container]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::job::{FailureKind, JobStatus};
    use crate::cache::FsCacheStore;
    use crate::testing::{descriptor_in, FailingCacheStore, FakeBuild, FakeRuntime};
    use tempfile::TempDir;

    fn settings(work: &TempDir) -> ExecutorSettings {
        ExecutorSettings {
            run_id: "1a2b3c4d".to_string(),
            os_family: "linux".to_string(),
            artifact_path: "worker".to_string(),
            source_root: work.path().join("src"),
            work_dir: work.path().join("run"),
            timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn successful_build_without_cache() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let executor = BuildExecutor::new(runtime.clone(), settings(&work));
        let d = descriptor_in(&work, "distroA", "x86_64");

        let job = executor.execute(BuildJob::new(d), None).await;

        assert_eq!(job.status(), JobStatus::Succeeded);
        let artifact = job.artifact_path().unwrap();
        assert_eq!(
            std::fs::read_to_string(artifact).unwrap(),
            "binary for x86_64-distroA"
        );
        assert!(!job.cache_hit());
        assert!(job.cache_key().is_some());
        assert_eq!(runtime.count("build:"), 1);
        assert_eq!(runtime.count("save:"), 0);
    }

    #[tokio::test]
    async fn container_sees_recipe_and_output_mounts() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let executor = BuildExecutor::new(runtime.clone(), settings(&work));
        let d = descriptor_in(&work, "distroA", "arm64");

        executor.execute(BuildJob::new(d), None).await;

        let runs = runtime.runs();
        assert_eq!(runs.len(), 1);
        let (config, command) = &runs[0];
        assert_eq!(config.name, "relmatrix-1a2b3c4d-arm64-distroA");
        assert_eq!(config.platform, "linux/arm64");
        assert_eq!(command, &vec!["/bin/sh".to_string(), "/recipe/build.sh".to_string()]);
        assert!(config.host_path_for(WORKSPACE_MOUNT).is_some());
        assert!(config
            .mounts
            .iter()
            .any(|m| m.container == "/recipe/build.sh" && m.readonly));
        assert_eq!(config.env["RELMATRIX_ARTIFACT"], "/out/worker");
    }

    #[tokio::test]
    async fn non_zero_exit_fails_with_diagnostic() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new().with_build(
            "x86_64-distroA",
            FakeBuild::exits(101).with_output(&["Compiling worker", "error: could not compile"]),
        ));
        let executor = BuildExecutor::new(runtime, settings(&work));

        let job = executor
            .execute(BuildJob::new(descriptor_in(&work, "distroA", "x86_64")), None)
            .await;

        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.artifact_path().is_none());
        let failure = job.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Build);
        assert!(failure.diagnostic.contains("exit code 101"));
        assert!(failure.diagnostic.contains("error: could not compile"));
    }

    #[tokio::test]
    async fn exit_zero_without_artifact_is_artifact_missing() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(
            FakeRuntime::new().with_build("x86_64-distroA", FakeBuild::succeeds_without_artifact()),
        );
        let executor = BuildExecutor::new(runtime, settings(&work));

        let job = executor
            .execute(BuildJob::new(descriptor_in(&work, "distroA", "x86_64")), None)
            .await;

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failure().unwrap().kind, FailureKind::ArtifactMissing);
    }

    #[tokio::test]
    async fn unreadable_recipe_is_resolution_failure() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let executor = BuildExecutor::new(runtime.clone(), settings(&work));
        let d = descriptor_in(&work, "distroA", "x86_64");
        std::fs::remove_file(&d.build_recipe_path).unwrap();

        let job = executor.execute(BuildJob::new(d), None).await;

        assert_eq!(job.failure().unwrap().kind, FailureKind::Resolution);
        assert!(runtime.runs().is_empty());
    }

    #[tokio::test]
    async fn slow_build_times_out_and_removes_container() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new().with_build(
            "x86_64-distroA",
            FakeBuild::default().with_delay(Duration::from_secs(5)),
        ));
        let mut settings = settings(&work);
        settings.timeout = Duration::from_millis(50);
        let executor = BuildExecutor::new(runtime.clone(), settings);

        let job = executor
            .execute(BuildJob::new(descriptor_in(&work, "distroA", "x86_64")), None)
            .await;

        assert_eq!(job.failure().unwrap().kind, FailureKind::Timeout);
        assert_eq!(runtime.count("remove:relmatrix-1a2b3c4d-x86_64-distroA"), 1);
    }

    #[tokio::test]
    async fn miss_then_hit_reuses_cached_layer() {
        let work = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache_dir.path());
        let d = descriptor_in(&work, "distroA", "x86_64");

        // First run: miss, build, store
        let first_runtime = Arc::new(FakeRuntime::new());
        let first = BuildExecutor::new(first_runtime.clone(), settings(&work))
            .execute(BuildJob::new(d.clone()), Some(&store))
            .await;
        assert_eq!(first.status(), JobStatus::Succeeded);
        assert!(!first.cache_hit());
        assert_eq!(first_runtime.count("save:"), 1);
        assert!(!work.path().join("run/x86_64-distroA/layer.tar").exists());
        let first_artifact = std::fs::read(first.artifact_path().unwrap()).unwrap();

        // Second run on a fresh engine: hit, load instead of build
        let second_runtime = Arc::new(FakeRuntime::new());
        let mut second_settings = settings(&work);
        second_settings.work_dir = work.path().join("run-2");
        let second = BuildExecutor::new(second_runtime.clone(), second_settings)
            .execute(BuildJob::new(d), Some(&store))
            .await;

        assert_eq!(second.status(), JobStatus::Succeeded);
        assert!(second.cache_hit());
        assert_eq!(second.cache_key(), first.cache_key());
        assert_eq!(second_runtime.count("load:"), 1);
        assert_eq!(second_runtime.count("build:"), 0);
        assert_eq!(second_runtime.count("save:"), 0);
        assert_eq!(std::fs::read(second.artifact_path().unwrap()).unwrap(), first_artifact);
    }

    #[tokio::test]
    async fn edited_image_definition_misses_cache() {
        let work = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache_dir.path());
        let d = descriptor_in(&work, "distroA", "x86_64");

        BuildExecutor::new(Arc::new(FakeRuntime::new()), settings(&work))
            .execute(BuildJob::new(d.clone()), Some(&store))
            .await;

        std::fs::write(&d.image_definition_path, "FROM distroA:next\n").unwrap();

        let runtime = Arc::new(FakeRuntime::new());
        let job = BuildExecutor::new(runtime.clone(), settings(&work))
            .execute(BuildJob::new(d), Some(&store))
            .await;

        assert!(!job.cache_hit());
        assert_eq!(runtime.count("build:"), 1);
    }

    #[tokio::test]
    async fn cache_store_failure_does_not_fail_build() {
        let work = TempDir::new().unwrap();
        let executor = BuildExecutor::new(Arc::new(FakeRuntime::new()), settings(&work));

        let job = executor
            .execute(
                BuildJob::new(descriptor_in(&work, "distroA", "x86_64")),
                Some(&FailingCacheStore),
            )
            .await;

        assert_eq!(job.status(), JobStatus::Succeeded);
        // The saved image archive is cleaned up even when the store rejects it
        assert!(!work.path().join("run/x86_64-distroA/layer.tar").exists());
    }

    #[tokio::test]
    async fn terminal_job_is_not_rerun() {
        let work = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let executor = BuildExecutor::new(runtime.clone(), settings(&work));

        let job = executor
            .execute(BuildJob::new(descriptor_in(&work, "distroA", "x86_64")), None)
            .await;
        let again = executor.execute(job, None).await;

        assert_eq!(again.status(), JobStatus::Succeeded);
        assert_eq!(runtime.runs().len(), 1);
    }

    #[test]
    fn image_tag_is_lowercase() {
        let d = PlatformDescriptor::new("distroA", "x86_64", "build.sh", "Dockerfile");
        let key = CacheKey::from_hex("0123456789abcdef".repeat(4));
        assert_eq!(
            BuildExecutor::image_tag(&d, &key),
            "relmatrix/x86_64-distroa:0123456789ab"
        );
    }
}
