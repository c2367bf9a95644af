use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobSpec;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("worker_pool_size must be at least 1")]
    EmptyWorkerPool,

    #[error("job {index} has an empty path_to_cmd")]
    EmptyCommand { index: usize },

    #[error("job {index} path_to_cmd `{command}` does not name a file")]
    InvalidCommand { index: usize, command: String },
}

// `shutdown_timeout_secs` is read as (possibly fractional) seconds
mod secs {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

/// What a worker does when one of its jobs fails to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// the failing job takes its worker down
    StopWorker,
    /// log the failure and pull the next job
    SkipJob,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::StopWorker
    }
}

/// Run configuration, read once at startup.
///
/// ```toml
/// id = "nightly"
/// worker_pool_size = 2
/// out_dir = "out"
///
/// [[jobs]]
/// path_to_cmd = "echo"
/// number_of_jobs = 3
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: String,
    pub worker_pool_size: usize,
    #[serde(rename = "jobs")]
    pub job_specs: Vec<JobSpec>,
    /// root for per-job `stdout.txt` files, output is only captured in memory if unset
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub on_job_failure: FailurePolicy,
    /// bounded wait for workers after cancellation, unbounded if unset
    #[serde(default, rename = "shutdown_timeout_secs", with = "secs")]
    pub shutdown_timeout: Option<Duration>,
}

impl Configuration {
    pub fn new(id: &str, worker_pool_size: usize, job_specs: Vec<JobSpec>) -> Self {
        Self {
            id: id.to_string(),
            worker_pool_size,
            job_specs,
            out_dir: None,
            on_job_failure: FailurePolicy::default(),
            shutdown_timeout: None,
        }
    }

    pub fn with_out_dir<P: AsRef<Path>>(mut self, out_dir: P) -> Self {
        self.out_dir = Some(out_dir.as_ref().to_path_buf());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_job_failure = policy;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// read, parse and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Configuration = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::EmptyWorkerPool);
        }
        if let Some(index) = self
            .job_specs
            .iter()
            .position(|spec| spec.command.trim().is_empty())
        {
            return Err(ConfigError::EmptyCommand { index });
        }
        if let Some((index, spec)) = self
            .job_specs
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.command_name().is_none())
        {
            return Err(ConfigError::InvalidCommand {
                index,
                command: spec.command.clone(),
            });
        }
        Ok(())
    }

    /// sum of `number_of_jobs` over all job specs
    pub fn total_jobs(&self) -> usize {
        self.job_specs.iter().map(|spec| spec.count).sum()
    }
}
