//! Platform descriptors and the validated registry for one run
//!
//! A descriptor is one (OS flavor, CPU architecture) target together with
//! the build recipe and image definition used to produce its binary.

use crate::config::{ConfigManager, MatrixConfig};
use crate::error::{MatrixError, MatrixResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// One build target. Immutable once the registry is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformDescriptor {
    pub id: String,
    pub os_flavor: String,
    pub architecture: String,
    pub build_recipe_path: PathBuf,
    pub image_definition_path: PathBuf,
}

impl PlatformDescriptor {
    /// Create a descriptor with the default `{architecture}-{os_flavor}` id
    pub fn new(
        os_flavor: impl Into<String>,
        architecture: impl Into<String>,
        build_recipe_path: impl Into<PathBuf>,
        image_definition_path: impl Into<PathBuf>,
    ) -> Self {
        let os_flavor = os_flavor.into();
        let architecture = architecture.into();
        Self {
            id: default_id(&os_flavor, &architecture),
            os_flavor,
            architecture,
            build_recipe_path: build_recipe_path.into(),
            image_definition_path: image_definition_path.into(),
        }
    }

    /// Override the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} on {})", self.id, self.os_flavor, self.architecture)
    }
}

fn default_id(os_flavor: &str, architecture: &str) -> String {
    format!("{}-{}", architecture, os_flavor)
}

/// Ids end up in container names, cache directories and artifact names.
fn validate_id(id: &str) -> MatrixResult<()> {
    if id.is_empty() {
        return Err(MatrixError::InvalidPlatformId {
            id: id.to_string(),
            reason: "id is empty".to_string(),
        });
    }

    // Rules out "." and "..", which would resolve outside per-platform directories
    if !id.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(MatrixError::InvalidPlatformId {
            id: id.to_string(),
            reason: "id must start with a letter or digit".to_string(),
        });
    }

    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(MatrixError::InvalidPlatformId {
            id: id.to_string(),
            reason: format!("character '{}' is not allowed", bad),
        });
    }

    Ok(())
}

/// The complete, validated set of descriptors for a run
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    descriptors: Vec<PlatformDescriptor>,
}

impl PlatformRegistry {
    /// Validate descriptors: ids unique and well-formed, referenced files exist.
    pub fn new(descriptors: Vec<PlatformDescriptor>) -> MatrixResult<Self> {
        let mut seen = HashSet::new();

        for descriptor in &descriptors {
            validate_id(&descriptor.id)?;

            // Image tags are lowercased and filesystems may fold case
            if !seen.insert(descriptor.id.to_ascii_lowercase()) {
                return Err(MatrixError::DuplicatePlatform(descriptor.id.clone()));
            }

            for path in [
                &descriptor.build_recipe_path,
                &descriptor.image_definition_path,
            ] {
                if !path.is_file() {
                    return Err(MatrixError::PathNotFound(path.clone()));
                }
            }
        }

        debug!("Validated {} platform descriptors", descriptors.len());
        Ok(Self { descriptors })
    }

    /// Build the registry for a named matrix, resolving paths against the config file
    pub fn from_config(
        name: &str,
        matrix: &MatrixConfig,
        manager: &ConfigManager,
    ) -> MatrixResult<Self> {
        if matrix.platforms.is_empty() {
            return Err(MatrixError::EmptyMatrix(name.to_string()));
        }

        let descriptors = matrix
            .platforms
            .iter()
            .map(|p| {
                let descriptor = PlatformDescriptor::new(
                    p.os_flavor.clone(),
                    p.architecture.clone(),
                    manager.resolve(&p.build_recipe),
                    manager.resolve(&p.image_definition),
                );
                match p.id {
                    Some(ref id) => descriptor.with_id(id.clone()),
                    None => descriptor,
                }
            })
            .collect();

        Self::new(descriptors)
    }

    /// Restrict the registry to the given ids, keeping declaration order
    pub fn select(self, ids: &[String]) -> MatrixResult<Self> {
        if ids.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = ids
            .iter()
            .find(|id| !self.descriptors.iter().any(|d| &d.id == *id))
        {
            return Err(MatrixError::UnknownPlatform(unknown.clone()));
        }

        let descriptors = self
            .descriptors
            .into_iter()
            .filter(|d| ids.contains(&d.id))
            .collect();

        Ok(Self { descriptors })
    }

    pub fn descriptors(&self) -> &[PlatformDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
