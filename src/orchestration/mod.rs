//! Orchestration module for container runtimes
//!
//! Provides engine-agnostic container management for platform builds:
//! podman or docker, selected by `build.engine`.

mod cli_runtime;
pub mod container;
mod runtime;

pub use cli_runtime::{CliRuntime, Engine};
pub use container::{ContainerConfig, ContainerExit, ImageBuild, Mount};
pub use runtime::{ContainerRuntime, OutputSink};

use crate::config::Config;
use crate::error::MatrixResult;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in build diagnostics.
pub const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Create the container runtime selected in the configuration
pub fn create_runtime(config: &Config) -> MatrixResult<Arc<dyn ContainerRuntime>> {
    let engine = Engine::parse(&config.build.engine)?;
    Ok(Arc::new(CliRuntime::new(engine)))
}

/// Extract the useful tail of build output for error diagnostics.
///
/// Returns the last `BUILD_ERROR_TAIL_LINES` lines so diagnostics are
/// actionable without being overwhelming.
pub fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. This is a standalone
/// async function (not behind `async_trait`) to avoid lifetime issues with the
/// `dyn Fn` callback.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut all_output = Vec::new();

    let (Some(stderr), Some(stdout)) = (child.stderr.take(), child.stdout.take()) else {
        return all_output;
    };

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    all_output
}
