mod config;
mod job;

pub use config::{ConfigError, Configuration, FailurePolicy};
pub use job::{command_name, JobOutput, JobSpec, JobStatus};
