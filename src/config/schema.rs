//! Configuration schema for relmatrix
//!
//! Configuration is read from `relmatrix.toml`, discovered by walking up
//! from the current directory, or from the path given with `--config`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// The product being built
    pub product: ProductConfig,

    /// Build execution settings
    pub build: BuildConfig,

    /// Layer cache settings
    pub cache: CacheConfig,

    /// Artifact publishing settings
    pub publish: PublishConfig,

    /// Named build matrices
    pub matrix: BTreeMap<String, MatrixConfig>,
}

impl Config {
    /// Name of the matrix to use when none is selected explicitly.
    ///
    /// Falls back to the only declared matrix when `default_matrix` is unset.
    pub fn default_matrix_name(&self) -> Option<String> {
        if let Some(ref name) = self.general.default_matrix {
            return Some(name.clone());
        }
        if self.matrix.len() == 1 {
            return self.matrix.keys().next().cloned();
        }
        None
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append a JSON line per finished run to the history log
    pub history: bool,

    /// Matrix to run when `--matrix` is not given
    pub default_matrix: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            history: true,
            default_matrix: None,
        }
    }
}

/// Product settings shared by every platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    /// Product name, first component of every artifact name
    pub name: String,

    /// Operating system family the images run (used for `--platform`)
    pub os_family: String,

    /// Artifact location relative to the output mount, same for every platform
    pub artifact_path: String,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            os_family: "linux".to_string(),
            artifact_path: "worker".to_string(),
        }
    }
}

/// Build execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Container engine CLI: "podman" or "docker"
    pub engine: String,

    /// Wall-clock limit per platform build in seconds
    pub timeout_secs: u64,

    /// Maximum concurrently running builds (0 = unbounded)
    pub max_parallel: usize,

    /// Source tree mounted into every build, relative to the config file
    pub source_root: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            engine: "podman".to_string(),
            timeout_secs: 3600,
            max_parallel: 0,
            source_root: PathBuf::from("."),
        }
    }
}

/// Layer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable layer caching (default: true)
    pub enabled: bool,

    /// Cache directory (default: state dir)
    pub dir: Option<PathBuf>,

    /// Remove cache entries older than N days on gc (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            gc_days: 30,
        }
    }
}

/// Artifact publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Directory receiving published artifacts, relative to the config file
    pub dir: PathBuf,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist"),
        }
    }
}

/// A named set of platforms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub platforms: Vec<PlatformConfig>,
}

/// One platform declaration as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Explicit id; defaults to `{architecture}-{os_flavor}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub os_flavor: String,

    pub architecture: String,

    /// Build script run inside the container
    pub build_recipe: PathBuf,

    /// Dockerfile/Containerfile for the build image
    pub image_definition: PathBuf,
}
