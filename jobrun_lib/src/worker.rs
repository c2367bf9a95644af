use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use jobrun_data::{FailurePolicy, JobOutput};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{JobRunError, Result},
    job::{Job, OutputDestination},
    queue::JobQueue,
};

pub const STDOUT_FILE_NAME: &str = "stdout.txt";

/// Terminal state of a worker task.
#[derive(Debug)]
pub enum WorkerExit {
    Cancelled,
    Failed { error: JobRunError },
    /// the task was aborted or panicked before reaching a terminal state itself
    Aborted,
}

impl WorkerExit {
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerExit::Failed { .. })
    }
}

/// `<root>/<worker_id>/<command_name>/<timestamp>`
///
/// Two jobs with the same command finishing on the same worker within one
/// second share a directory, the later one overwrites the earlier output.
pub fn output_dir(root: &Path, worker_id: usize, job: &Job, timestamp: i64) -> PathBuf {
    root.join(worker_id.to_string())
        .join(job.command_name())
        .join(timestamp.to_string())
}

// logs on every way out of the worker loop, including abort
struct Cleanup {
    id: usize,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        info!(worker = self.id, "cleaning up");
    }
}

pub struct Worker {
    id: usize,
    queue: Arc<JobQueue>,
    out_dir: Option<PathBuf>,
    policy: FailurePolicy,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(id: usize, queue: Arc<JobQueue>, cancel: CancellationToken) -> Self {
        Self {
            id,
            queue,
            out_dir: None,
            policy: FailurePolicy::default(),
            cancel,
        }
    }

    pub fn with_out_dir(mut self, out_dir: Option<PathBuf>) -> Self {
        self.out_dir = out_dir;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// pull and run jobs until cancelled or a job fails under [`FailurePolicy::StopWorker`]
    /// cancellation is only observed between jobs, a running job is never interrupted
    pub async fn run(self) -> WorkerExit {
        info!(worker = self.id, "starting");
        let _cleanup = Cleanup { id: self.id };
        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(worker = self.id, "cancelling");
                    return WorkerExit::Cancelled;
                }
                job = self.queue.pop() => job,
            };

            let result = self.process(&job).await;
            if let Err(err) = self.queue.acknowledge() {
                error!(worker = self.id, %err, "acknowledge out of sync with queue");
            }

            match result {
                Ok(output) => self.log_finished(&job, &output),
                Err(error) => match self.policy {
                    FailurePolicy::StopWorker => {
                        error!(
                            worker = self.id,
                            command = job.command(),
                            %error,
                            "job failed, stopping worker"
                        );
                        return WorkerExit::Failed { error };
                    }
                    FailurePolicy::SkipJob => {
                        warn!(
                            worker = self.id,
                            command = job.command(),
                            %error,
                            "job failed, skipping"
                        );
                    }
                },
            }
        }
    }

    async fn process(&self, job: &Job) -> Result<JobOutput> {
        let destination = match &self.out_dir {
            Some(root) => OutputDestination::File(self.prepare_output(root, job).await?),
            None => OutputDestination::Captured,
        };
        info!(
            worker = self.id,
            command = job.command(),
            ?destination,
            "processing command"
        );
        job.run(&destination).await
    }

    /// create the per-job directory and return the path of its stdout file
    async fn prepare_output(&self, root: &Path, job: &Job) -> Result<PathBuf> {
        let dir = output_dir(root, self.id, job, chrono::Utc::now().timestamp());
        let exists = tokio::fs::metadata(&dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if exists {
            warn!(
                worker = self.id,
                path = %dir.display(),
                "output path already exists, overwriting"
            );
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| JobRunError::Output {
                path: dir.clone(),
                source,
            })?;
        Ok(dir.join(STDOUT_FILE_NAME))
    }

    fn log_finished(&self, job: &Job, output: &JobOutput) {
        if output.status().success() {
            info!(
                worker = self.id,
                command = job.command(),
                stdout = %output.stdout_lossy().trim_end(),
                "finished processing command"
            );
        } else {
            warn!(
                worker = self.id,
                command = job.command(),
                status = ?output.status(),
                stderr = %output.stderr_lossy().trim_end(),
                "command exited unsuccessfully"
            );
        }
    }
}
