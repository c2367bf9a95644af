use std::sync::Arc;

use jobrun_data::Configuration;
use rand::seq::SliceRandom;
use tracing::{error, info, instrument};

use crate::{
    error::Result,
    job::Job,
    queue::JobQueue,
    worker_pool::{PoolReport, WorkerPool},
};

/// expand every job spec, in configuration order
pub fn build_jobs(config: &Configuration) -> Vec<Job> {
    config.job_specs.iter().flat_map(Job::from_spec).collect()
}

/// uniform shuffle so workers don't all start on the same command
pub fn shuffle_jobs(jobs: &mut [Job]) {
    jobs.shuffle(&mut rand::thread_rng());
}

/// Runs one batch described by a [`Configuration`].
pub struct Handler {
    config: Configuration,
}

impl Handler {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    /// run every job and return once all workers have terminated
    ///
    /// Job failures do not fail the run, they show up in the logs and the
    /// returned [`PoolReport`]. Only an invalid configuration or a queue sized
    /// too small for the job list is reported as an error.
    #[instrument(skip(self), fields(id = %self.config.id))]
    pub async fn run(self) -> Result<PoolReport> {
        self.config.validate()?;
        let mut jobs = build_jobs(&self.config);
        shuffle_jobs(&mut jobs);
        let queue = Arc::new(JobQueue::with_capacity(jobs.len()));
        info!(
            jobs = jobs.len(),
            capacity = queue.capacity(),
            workers = self.config.worker_pool_size,
            "starting run"
        );
        let pool = WorkerPool::launch(&self.config, queue.clone());
        for job in jobs {
            if let Err(err) = queue.push(job) {
                error!(%err, "job list does not fit the queue");
                pool.shutdown().await;
                return Err(err);
            }
        }

        let report = pool.drain_and_shutdown().await;
        info!(
            unacknowledged = report.unacknowledged,
            failed_workers = report.failed().count(),
            "run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use jobrun_data::{Configuration, JobSpec};

    use super::{build_jobs, shuffle_jobs};
    use crate::job::Job;

    fn config() -> Configuration {
        Configuration::new(
            "handler-test",
            2,
            vec![
                JobSpec::new("echo", 3),
                JobSpec::new("ls", 0),
                JobSpec::new("true", 5).with_args(&["x"]),
            ],
        )
    }

    #[test]
    fn test_build_jobs_count() {
        let config = config();
        let jobs = build_jobs(&config);
        assert_eq!(config.total_jobs(), jobs.len());
        assert_eq!(8, jobs.len());
        assert_eq!(3, jobs.iter().filter(|j| j.command() == "echo").count());
        assert!(jobs.iter().all(|j| j.command() != "ls"));
        assert!(jobs
            .iter()
            .filter(|j| j.command() == "true")
            .all(|j| j.arguments() == ["x".to_string()]));
    }

    #[test]
    fn test_build_jobs_without_args() {
        let jobs = build_jobs(&config());
        assert!(jobs
            .iter()
            .filter(|j| j.command() == "echo")
            .all(|j| j.arguments().is_empty()));
    }

    // shuffling only reorders, the multiset of jobs stays the same
    #[test]
    fn test_shuffle_preserves_jobs() {
        let config = Configuration::new(
            "shuffle",
            1,
            (0..20)
                .map(|i| JobSpec::new(&format!("cmd-{}", i), i % 4))
                .collect(),
        );
        let mut expected = build_jobs(&config);
        expected.sort();
        for _ in 0..50 {
            let mut jobs = build_jobs(&config);
            shuffle_jobs(&mut jobs);
            jobs.sort();
            assert_eq!(expected, jobs);
        }
    }

    #[test]
    fn test_shuffle_empty() {
        let mut jobs: Vec<Job> = Vec::new();
        shuffle_jobs(&mut jobs);
        assert!(jobs.is_empty());
    }
}
