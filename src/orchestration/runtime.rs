//! Container runtime abstraction
//!
//! Provides a trait for the container operations a platform build needs,
//! so the build executor can drive podman, docker, or a test double.

use crate::error::MatrixResult;
use crate::orchestration::container::{ContainerConfig, ContainerExit, ImageBuild};
use async_trait::async_trait;
use std::path::Path;

/// Callback receiving each output line of a long-running engine command
pub type OutputSink<'a> = &'a (dyn Fn(String) + Send + Sync);

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the runtime is available on this system
    async fn is_available(&self) -> MatrixResult<bool>;

    /// Ensure the runtime is ready to accept builds
    async fn ensure_ready(&self) -> MatrixResult<()>;

    /// Check if an image tag exists locally
    async fn image_exists(&self, tag: &str) -> MatrixResult<bool>;

    /// Build an image, streaming build output to `on_output`
    async fn build_image(&self, build: &ImageBuild, on_output: OutputSink<'_>) -> MatrixResult<()>;

    /// Load an image archive previously produced by `save_image`
    async fn load_image(&self, archive: &Path) -> MatrixResult<()>;

    /// Save an image (with its layers) to an archive file
    async fn save_image(&self, tag: &str, archive: &Path) -> MatrixResult<()>;

    /// Run a container until it exits, streaming output to `on_output`.
    ///
    /// A non-zero exit is reported through `ContainerExit`, not as an error.
    async fn run_to_completion(
        &self,
        config: &ContainerConfig,
        command: &[String],
        on_output: OutputSink<'_>,
    ) -> MatrixResult<ContainerExit>;

    /// Force-remove a container; succeeds if it no longer exists
    async fn remove(&self, name: &str) -> MatrixResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
