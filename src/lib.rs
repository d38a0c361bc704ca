//! relmatrix - release build matrix orchestrator
//!
//! Builds one product for a matrix of (OS flavor, CPU architecture)
//! platforms. Each platform gets its own containerized build; image layers
//! are cached by the content of the image definition and build recipe, and
//! every artifact is published under a platform-qualified name.

pub mod artifact;
pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod matrix;
pub mod orchestration;
pub mod platform;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{MatrixError, MatrixResult};
