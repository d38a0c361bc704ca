//! Progress notifications emitted while a matrix runs

use crate::build::job::BuildJob;

/// Receives job lifecycle events; implementations must tolerate calls
/// from many jobs concurrently.
pub trait RunObserver: Send + Sync {
    fn job_started(&self, _platform_id: &str) {}

    fn job_output(&self, _platform_id: &str, _line: &str) {}

    fn job_finished(&self, _job: &BuildJob) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
