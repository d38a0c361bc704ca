//! Per-platform build jobs and their execution

pub mod executor;
pub mod job;
pub mod observer;

pub use executor::{BuildExecutor, ExecutorSettings};
pub use job::{BuildJob, FailureKind, JobFailure, JobStatus};
pub use observer::{NoopObserver, RunObserver};
