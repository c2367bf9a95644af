use std::path::PathBuf;

use jobrun_data::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobRunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job queue is full, capacity {capacity}")]
    CapacityExceeded { capacity: usize },

    #[error("acknowledged more jobs than were queued")]
    Overacknowledged,
}

impl JobRunError {
    pub fn is_spawn(&self) -> bool {
        matches!(self, JobRunError::Spawn { .. })
    }
}

pub type Result<T> = std::result::Result<T, JobRunError>;
