//! Configuration management for relmatrix

pub mod schema;

pub use schema::{Config, MatrixConfig, PlatformConfig};

use crate::error::{MatrixError, MatrixResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name looked up when no explicit config path is given
pub const CONFIG_FILE_NAME: &str = "relmatrix.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for `relmatrix.toml` in the given directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Walk up from `start` looking for `relmatrix.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relmatrix")
    }

    /// Default location of the layer cache
    pub fn default_cache_dir() -> PathBuf {
        Self::state_dir().join("cache")
    }

    /// Get the run history log path
    pub fn history_log_path() -> PathBuf {
        Self::state_dir().join("history.log")
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub async fn load(&self) -> MatrixResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration, failing if the file is absent
    pub async fn load_required(&self) -> MatrixResult<Config> {
        if !self.config_path.exists() {
            return Err(MatrixError::ConfigNotFound(self.config_path.clone()));
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> MatrixResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| MatrixError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| MatrixError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> MatrixResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            MatrixError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> MatrixResult<()> {
        if let Some(parent) = self.config_path.parent() {
            if parent.as_os_str().is_empty() {
                return Ok(());
            }
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MatrixError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Directory that relative paths in the config are resolved against
    pub fn base_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Resolve a config-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
