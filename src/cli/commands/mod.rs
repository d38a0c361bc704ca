//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod config;
pub mod list;
pub mod run;
pub mod status;
pub mod validate;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use list::execute as list;
pub use run::execute as run;
pub use status::execute as status;
pub use validate::execute as validate;

use crate::cache::FsCacheStore;
use crate::config::{Config, ConfigManager};
use crate::error::{MatrixError, MatrixResult};
use crate::platform::PlatformRegistry;
use tracing::debug;

/// Resolve the selected matrix into a validated registry.
///
/// Returns the matrix name alongside the registry.
pub(crate) fn load_registry(
    manager: &ConfigManager,
    config: &Config,
    matrix: Option<&str>,
) -> MatrixResult<(String, PlatformRegistry)> {
    if !manager.path().exists() {
        return Err(MatrixError::ConfigNotFound(manager.path().to_path_buf()));
    }

    let name = match matrix {
        Some(name) => name.to_string(),
        None => config.default_matrix_name().ok_or_else(|| MatrixError::ConfigInvalid {
            path: manager.path().to_path_buf(),
            reason: "no matrix selected: pass --matrix or set general.default_matrix".to_string(),
        })?,
    };

    let declared = config
        .matrix
        .get(&name)
        .ok_or_else(|| MatrixError::MatrixNotFound(name.clone()))?;

    debug!("Loading matrix '{}' from {}", name, manager.path().display());
    let registry = PlatformRegistry::from_config(&name, declared, manager)?;
    Ok((name, registry))
}

/// File cache store at the configured (or default) location
pub(crate) fn cache_store(manager: &ConfigManager, config: &Config) -> FsCacheStore {
    let root = match config.cache.dir {
        Some(ref dir) => manager.resolve(dir),
        None => ConfigManager::default_cache_dir(),
    };
    FsCacheStore::new(root)
}
