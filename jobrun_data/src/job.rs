use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// final path component of `command` when it names a file, `/bin/echo` becomes `echo`
///
/// `None` for commands ending in `/`, `.` or `..`, which cannot name a directory
/// below an output root.
pub fn command_name(command: &str) -> Option<&str> {
    match Path::new(command).components().next_back() {
        Some(Component::Normal(name)) => name.to_str(),
        _ => None,
    }
}

/// One entry of the `jobs` table, expanded into `count` identical jobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(rename = "path_to_cmd")]
    pub command: String,
    #[serde(rename = "number_of_jobs")]
    pub count: usize,
    #[serde(default, rename = "args")]
    pub arguments: Vec<String>,
}

impl JobSpec {
    pub fn new(command: &str, count: usize) -> Self {
        Self {
            command: command.to_string(),
            count,
            arguments: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.arguments = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn command_name(&self) -> Option<&str> {
        command_name(&self.command)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed { exit_code: i32 },
    /// killed by a signal, no exit code
    Terminated,
}

impl JobStatus {
    pub fn success(&self) -> bool {
        matches!(self, JobStatus::Completed { exit_code: 0 })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    status: JobStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl JobOutput {
    pub fn new(status: JobStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            status,
            stdout,
            stderr,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
