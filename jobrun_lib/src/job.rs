use std::{
    path::PathBuf,
    process::{ExitStatus, Stdio},
};

use jobrun_data::{JobOutput, JobSpec, JobStatus};
use tokio::{fs::File, io, process::Command, sync::mpsc};
use tracing::{debug, instrument};

use crate::{
    error::{JobRunError, Result},
    util::{read_to_end, receive_all_chunks, Stream},
};

/// Where a job's stdout and stderr end up besides the in-memory capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputDestination {
    /// created or truncated before the process starts
    File(PathBuf),
    Captured,
}

/// output directory name for a command with no usable file name
pub const UNNAMED_COMMAND: &str = "unnamed";

fn job_status(status: ExitStatus) -> JobStatus {
    match status.code() {
        Some(exit_code) => JobStatus::Completed { exit_code },
        None => JobStatus::Terminated,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Job {
    command: String,
    arguments: Vec<String>,
}

impl Job {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            arguments: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// expands a spec into `spec.count` independent jobs
    pub fn from_spec(spec: &JobSpec) -> Vec<Job> {
        (0..spec.count)
            .map(|_| Job {
                command: spec.command.clone(),
                arguments: spec.arguments.clone(),
            })
            .collect()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// last path component of the command, `/bin/echo` becomes `echo`
    /// commands that name no file map to [`UNNAMED_COMMAND`]
    pub fn command_name(&self) -> &str {
        jobrun_data::command_name(&self.command).unwrap_or(UNNAMED_COMMAND)
    }

    /// spawn the command, stream its output into `destination` and wait for it to exit
    /// the child is killed if the returned future is dropped before completion
    #[instrument(skip(self), fields(command = %self.command))]
    pub async fn run(&self, destination: &OutputDestination) -> Result<JobOutput> {
        let mut sink = match destination {
            OutputDestination::File(path) => {
                Some(File::create(path).await.map_err(|source| JobRunError::Output {
                    path: path.clone(),
                    source,
                })?)
            }
            OutputDestination::Captured => None,
        };

        let mut process = Command::new(&self.command)
            .args(&self.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| JobRunError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        debug!(pid = ?process.id(), "process spawned");

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| self.io_error("stdout not piped"))?;
        let stderr = process
            .stderr
            .take()
            .ok_or_else(|| self.io_error("stderr not piped"))?;

        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let (stdout_result, stderr_result, received) = tokio::join!(
            read_to_end(stdout, Stream::Stdout, chunk_tx.clone()),
            read_to_end(stderr, Stream::Stderr, chunk_tx),
            receive_all_chunks(&mut chunk_rx, sink.as_mut()),
        );
        let wrap = |source: io::Error| JobRunError::Io {
            command: self.command.clone(),
            source,
        };
        stdout_result.map_err(wrap)?;
        stderr_result.map_err(wrap)?;
        let (stdout, stderr) = received.map_err(wrap)?;

        let status = process.wait().await.map_err(wrap)?;
        debug!(?status, "process exited");
        Ok(JobOutput::new(job_status(status), stdout, stderr))
    }

    fn io_error(&self, msg: &str) -> JobRunError {
        JobRunError::Io {
            command: self.command.clone(),
            source: io::Error::new(io::ErrorKind::Other, msg.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Once;

    use jobrun_data::{JobSpec, JobStatus};
    use lazy_static::lazy_static;
    use tokio::runtime::Runtime;

    use super::{Job, OutputDestination, UNNAMED_COMMAND};

    lazy_static! {
        static ref RUNTIME: Runtime = Runtime::new().unwrap();
    }
    static INIT: Once = Once::new();

    pub fn setup() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt::try_init();
        });
    }

    // expanding a spec yields count identical jobs
    #[test]
    fn test_from_spec() {
        let jobs = Job::from_spec(&JobSpec::new("echo", 3).with_args(&["hi"]));
        assert_eq!(3, jobs.len());
        for job in jobs {
            assert_eq!(Job::new("echo", &["hi"]), job);
        }
        assert!(Job::from_spec(&JobSpec::new("echo", 0)).is_empty());
    }

    #[test]
    fn test_command_name() {
        assert_eq!("echo", Job::new("/bin/echo", &[]).command_name());
        assert_eq!("echo", Job::new("echo", &[]).command_name());
        assert_eq!(UNNAMED_COMMAND, Job::new("/", &[]).command_name());
        assert_eq!(UNNAMED_COMMAND, Job::new("../..", &[]).command_name());
    }

    // testing captured output of echo command
    #[test]
    fn test_captured_echo() {
        setup();
        RUNTIME.block_on(async {
            let job = Job::new("echo", &["hi"]);
            let output = job.run(&OutputDestination::Captured).await.unwrap();
            assert_eq!(&JobStatus::Completed { exit_code: 0 }, output.status());
            assert_eq!(b"hi\n", output.stdout());
            assert!(output.stderr().is_empty());
        });
    }

    // testing that stderr and exit code are captured
    #[test]
    fn test_captured_stderr_and_exit_code() {
        setup();
        RUNTIME.block_on(async {
            let job = Job::new("sh", &["-c", "echo out; echo err >&2; exit 3"]);
            let output = job.run(&OutputDestination::Captured).await.unwrap();
            assert_eq!(&JobStatus::Completed { exit_code: 3 }, output.status());
            assert_eq!("out\n", output.stdout_lossy());
            assert_eq!("err\n", output.stderr_lossy());
        });
    }

    // testing file output of echo command
    #[test]
    fn test_file_echo() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.txt");
        RUNTIME.block_on(async {
            let job = Job::new("sh", &["-c", "echo hi; echo warn >&2"]);
            let output = job
                .run(&OutputDestination::File(path.clone()))
                .await
                .unwrap();
            assert_eq!("hi\n", output.stdout_lossy());
        });
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("hi\n"));
        assert!(written.contains("warn\n"));
    }

    // an existing file is overwritten
    #[test]
    fn test_file_overwritten() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.txt");
        std::fs::write(&path, "old contents that are longer\n").unwrap();
        RUNTIME.block_on(async {
            let job = Job::new("echo", &["new"]);
            job.run(&OutputDestination::File(path.clone())).await.unwrap();
        });
        assert_eq!("new\n", std::fs::read_to_string(&path).unwrap());
    }

    // testing invalid command
    #[test]
    fn test_invalid_command() {
        setup();
        RUNTIME.block_on(async {
            let job = Job::new("abcdfg", &[]);
            match job.run(&OutputDestination::Captured).await {
                Err(err) => assert!(err.is_spawn(), "unexpected error: {:?}", err),
                Ok(output) => panic!("expected spawn error, got: {:?}", output),
            }
        });
    }

    // output file in a missing directory fails before anything is spawned
    #[test]
    fn test_missing_output_dir() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("stdout.txt");
        RUNTIME.block_on(async {
            let job = Job::new("echo", &["hi"]);
            let result = job.run(&OutputDestination::File(path)).await;
            assert!(matches!(result, Err(crate::JobRunError::Output { .. })));
        });
    }
}
