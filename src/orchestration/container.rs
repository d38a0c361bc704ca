//! Container invocation types
//!
//! Contains data structures passed to container runtimes.
//! The actual engine invocation logic is in the runtime implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A host path mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Path on the host
    pub host: PathBuf,
    /// Mount point inside the container
    pub container: String,
    /// Whether to mount read-only
    pub readonly: bool,
}

impl Mount {
    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly: false,
        }
    }

    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly: true,
        }
    }

    /// Generate the `-v` argument
    pub fn volume_arg(&self) -> String {
        let ro = if self.readonly { ":ro" } else { "" };
        format!("{}:{}{}", self.host.display(), self.container, ro)
    }
}

/// Container configuration for one build run
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Container name, unique per run and platform
    pub name: String,
    /// Image tag to run
    pub image: String,
    /// Target platform (e.g. "linux/arm64")
    pub platform: String,
    /// Working directory inside the container
    pub workdir: String,
    /// Filesystem mounts
    pub mounts: Vec<Mount>,
    /// Environment variables
    pub env: BTreeMap<String, String>,
}

impl ContainerConfig {
    /// Host path mounted at `container_path`, if any
    pub fn host_path_for(&self, container_path: &str) -> Option<&Path> {
        self.mounts
            .iter()
            .find(|m| m.container == container_path)
            .map(|m| m.host.as_path())
    }
}

/// Request to build an image from a definition file
#[derive(Debug, Clone)]
pub struct ImageBuild {
    /// Tag applied to the built image
    pub tag: String,
    /// Dockerfile/Containerfile path
    pub definition: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Target platform (e.g. "linux/amd64")
    pub platform: String,
}

/// Terminal state of a container that ran to completion
#[derive(Debug, Clone)]
pub struct ContainerExit {
    /// Exit code (-1 when terminated by a signal)
    pub code: i32,
    /// Combined stdout/stderr lines
    pub output: Vec<String>,
}

impl ContainerExit {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}
