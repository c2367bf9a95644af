//! Runs a fixed batch of external commands on a bounded pool of workers.
//!
//! A [`Handler`] expands the configured job specs into [`Job`]s, shuffles
//! them into a [`JobQueue`] sized to fit all of them and lets a
//! [`WorkerPool`] work through the queue. Once every job is acknowledged the
//! pool cancels its workers and waits for them to terminate.

pub mod error;
pub mod handler;
pub mod job;
pub mod queue;
pub mod util;
pub mod worker;
pub mod worker_pool;

pub use error::{JobRunError, Result};
pub use handler::{build_jobs, shuffle_jobs, Handler};
pub use job::{Job, OutputDestination};
pub use jobrun_data::{ConfigError, Configuration, FailurePolicy, JobOutput, JobSpec, JobStatus};
pub use queue::JobQueue;
pub use worker::{Worker, WorkerExit};
pub use worker_pool::{PoolReport, WorkerPool, WorkerReport};
