//! Test doubles shared by unit tests

use crate::artifact::ArtifactSink;
use crate::cache::{CacheEntry, CacheKey, CacheStore, CachedLayer};
use crate::error::{MatrixError, MatrixResult};
use crate::orchestration::{ContainerConfig, ContainerExit, ContainerRuntime, ImageBuild, OutputSink};
use crate::platform::PlatformDescriptor;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Write a recipe and image definition for a platform under `dir`
pub fn descriptor_in(dir: &TempDir, os_flavor: &str, architecture: &str) -> PlatformDescriptor {
    let platform_dir = dir.path().join("platforms").join(format!("{}-{}", architecture, os_flavor));
    std::fs::create_dir_all(&platform_dir).unwrap();

    let recipe = platform_dir.join("build.sh");
    let image = platform_dir.join("Dockerfile");
    std::fs::write(&recipe, "#!/bin/sh\ncargo build --release\n").unwrap();
    std::fs::write(&image, format!("FROM {}:latest\n", os_flavor)).unwrap();

    PlatformDescriptor::new(os_flavor, architecture, recipe, image)
}

/// Scripted behavior of one platform's container run
#[derive(Debug, Clone)]
pub struct FakeBuild {
    pub exit_code: i32,
    pub write_artifact: bool,
    pub output: Vec<String>,
    pub delay: Option<Duration>,
    pub panic: bool,
}

impl Default for FakeBuild {
    fn default() -> Self {
        Self {
            exit_code: 0,
            write_artifact: true,
            output: vec!["Finished release".to_string()],
            delay: None,
            panic: false,
        }
    }
}

impl FakeBuild {
    pub fn exits(code: i32) -> Self {
        Self {
            exit_code: code,
            write_artifact: false,
            ..Self::default()
        }
    }

    pub fn succeeds_without_artifact() -> Self {
        Self {
            write_artifact: false,
            ..Self::default()
        }
    }

    pub fn panics() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, lines: &[&str]) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// In-memory container engine. Writes `binary for {platform}` into the
/// output mount on success.
#[derive(Default)]
pub struct FakeRuntime {
    builds: HashMap<String, FakeBuild>,
    images: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    runs: Mutex<Vec<(ContainerConfig, Vec<String>)>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(mut self, platform_id: &str, build: FakeBuild) -> Self {
        self.builds.insert(platform_id.to_string(), build);
        self
    }

    /// Number of recorded calls starting with `prefix`, e.g. `"build:"`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn runs(&self) -> Vec<(ContainerConfig, Vec<String>)> {
        self.runs.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> MatrixResult<bool> {
        Ok(true)
    }

    async fn ensure_ready(&self) -> MatrixResult<()> {
        Ok(())
    }

    async fn image_exists(&self, tag: &str) -> MatrixResult<bool> {
        Ok(self.images.lock().unwrap().contains(tag))
    }

    async fn build_image(&self, build: &ImageBuild, on_output: OutputSink<'_>) -> MatrixResult<()> {
        self.record(format!("build:{}", build.tag));
        on_output(format!("STEP 1/1: FROM {}", build.definition.display()));
        self.images.lock().unwrap().insert(build.tag.clone());
        Ok(())
    }

    async fn load_image(&self, archive: &Path) -> MatrixResult<()> {
        self.record(format!("load:{}", archive.display()));
        let content = tokio::fs::read_to_string(archive)
            .await
            .map_err(|e| MatrixError::io("reading image archive", e))?;
        let tag = content
            .strip_prefix("image ")
            .ok_or_else(|| MatrixError::command_exec("load", "not an image archive"))?;
        self.images.lock().unwrap().insert(tag.to_string());
        Ok(())
    }

    async fn save_image(&self, tag: &str, archive: &Path) -> MatrixResult<()> {
        self.record(format!("save:{}", tag));
        tokio::fs::write(archive, format!("image {}", tag))
            .await
            .map_err(|e| MatrixError::io("writing image archive", e))
    }

    async fn run_to_completion(
        &self,
        config: &ContainerConfig,
        command: &[String],
        on_output: OutputSink<'_>,
    ) -> MatrixResult<ContainerExit> {
        self.record(format!("run:{}", config.name));
        self.runs
            .lock()
            .unwrap()
            .push((config.clone(), command.to_vec()));

        if !self.images.lock().unwrap().contains(&config.image) {
            return Err(MatrixError::ContainerStart(format!("no such image {}", config.image)));
        }

        let platform = config.env["RELMATRIX_PLATFORM"].clone();
        let build = self.builds.get(&platform).cloned().unwrap_or_default();

        if let Some(delay) = build.delay {
            tokio::time::sleep(delay).await;
        }
        if build.panic {
            panic!("engine crashed while building {}", platform);
        }

        for line in &build.output {
            on_output(line.clone());
        }

        if build.write_artifact {
            let out = config.host_path_for("/out").unwrap();
            tokio::fs::write(out.join("worker"), format!("binary for {}", platform))
                .await
                .unwrap();
        }

        Ok(ContainerExit {
            code: build.exit_code,
            output: build.output,
        })
    }

    async fn remove(&self, name: &str) -> MatrixResult<()> {
        self.record(format!("remove:{}", name));
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}

/// Cache store that is never able to persist anything
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn lookup(&self, _platform_id: &str, _key: &CacheKey) -> MatrixResult<Option<CachedLayer>> {
        Ok(None)
    }

    async fn store(
        &self,
        platform_id: &str,
        _key: &CacheKey,
        _payload: &Path,
    ) -> MatrixResult<CacheEntry> {
        Err(MatrixError::CacheCorrupt {
            id: platform_id.to_string(),
            reason: "read-only cache".to_string(),
        })
    }

    async fn list(&self) -> MatrixResult<Vec<CacheEntry>> {
        Ok(Vec::new())
    }

    async fn remove(&self, _platform_id: &str) -> MatrixResult<bool> {
        Ok(false)
    }
}

/// Sink that collects artifacts in memory, optionally rejecting some names
#[derive(Default)]
pub struct MemorySink {
    accepted: Mutex<HashMap<String, Vec<u8>>>,
    reject: HashSet<String>,
}

impl MemorySink {
    pub fn rejecting(name: &str) -> Self {
        Self {
            reject: HashSet::from([name.to_string()]),
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.accepted.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn accept(&self, name: &str, bytes: Vec<u8>) -> MatrixResult<String> {
        if self.reject.contains(name) {
            return Err(MatrixError::User("destination refused upload".to_string()));
        }
        self.accepted.lock().unwrap().insert(name.to_string(), bytes);
        Ok(format!("memory://{}", name))
    }
}
