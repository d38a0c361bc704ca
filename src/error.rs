//! Error types for relmatrix
//!
//! All modules use `MatrixResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relmatrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;

/// All errors that can occur in relmatrix
#[derive(Error, Debug)]
pub enum MatrixError {
    // Configuration errors (fatal, abort before any job starts)
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate platform id in matrix: {0}")]
    DuplicatePlatform(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid platform id '{id}': {reason}")]
    InvalidPlatformId { id: String, reason: String },

    #[error("Matrix not found: {0}")]
    MatrixNotFound(String),

    #[error("Matrix '{0}' declares no platforms")]
    EmptyMatrix(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Per-job errors
    #[error("Cache key resolution failed for {path}: {source}")]
    Resolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build failed for {platform} with exit code {code}")]
    BuildFailed {
        platform: String,
        code: i32,
        output: String,
    },

    #[error("Image build failed: {image}: {reason}")]
    ImageBuild { image: String, reason: String },

    #[error("Container failed to start: {0}")]
    ContainerStart(String),

    #[error("Build for {platform} timed out after {secs}s", secs = .after.as_secs())]
    Timeout { platform: String, after: Duration },

    #[error("Build reported success but no artifact at {0}")]
    ArtifactMissing(PathBuf),

    #[error("Failed to publish {name}: {reason}")]
    Publish { name: String, reason: String },

    #[error("Job {platform} cannot move from {from} to {to}")]
    InvalidTransition {
        platform: String,
        from: String,
        to: String,
    },

    // Runtime environment errors
    #[error("Container engine not found: {0}")]
    EngineNotFound(String),

    #[error("Unsupported container engine: {0}. Use podman or docker.")]
    UnsupportedEngine(String),

    // Cache store errors
    #[error("Cache entry for {id} is corrupt: {reason}")]
    CacheCorrupt { id: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl MatrixError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether this error invalidates the whole run before fan-out
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::ConfigNotFound(_)
                | Self::DuplicatePlatform(_)
                | Self::UnknownPlatform(_)
                | Self::InvalidPlatformId { .. }
                | Self::MatrixNotFound(_)
                | Self::EmptyMatrix(_)
                | Self::PathNotFound(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound(_) => Some("Install podman or set build.engine = \"docker\""),
            Self::DuplicatePlatform(_) => Some("Give each platform an explicit unique `id`"),
            Self::MatrixNotFound(_) => Some("Run: relmatrix list to see declared matrices"),
            Self::ConfigNotFound(_) => Some("Run: relmatrix config init"),
            _ => None,
        }
    }
}
