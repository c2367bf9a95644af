use std::{collections::HashSet, sync::Arc, time::Duration};

use jobrun_data::Configuration;
use tokio::{
    task::{JoinError, JoinSet},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::{
    queue::JobQueue,
    worker::{Worker, WorkerExit},
};

#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    pub exit: WorkerExit,
}

/// Outcome of a pool run, one report per launched worker ordered by id.
#[derive(Debug, Default)]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
    /// pushed jobs that were never acknowledged
    pub unacknowledged: usize,
}

impl PoolReport {
    pub fn failed(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|report| report.exit.is_failed())
    }

    /// every job acknowledged and no worker failed or aborted
    pub fn is_clean(&self) -> bool {
        self.unacknowledged == 0
            && self
                .workers
                .iter()
                .all(|report| matches!(report.exit, WorkerExit::Cancelled))
    }
}

/// Fixed set of workers sharing one [`JobQueue`].
///
/// The pool is the only owner of its worker tasks: they are cancelled and
/// joined by [`WorkerPool::drain_and_shutdown`] or [`WorkerPool::shutdown`].
pub struct WorkerPool {
    size: usize,
    queue: Arc<JobQueue>,
    cancel: CancellationToken,
    workers: JoinSet<(usize, WorkerExit)>,
    shutdown_timeout: Option<Duration>,
    reports: Vec<WorkerReport>,
}

impl WorkerPool {
    /// spawn `worker_pool_size` workers against `queue`
    /// must be called from within a tokio runtime
    pub fn launch(config: &Configuration, queue: Arc<JobQueue>) -> Self {
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();
        for id in 0..config.worker_pool_size {
            let worker = Worker::new(id, queue.clone(), cancel.clone())
                .with_out_dir(config.out_dir.clone())
                .with_failure_policy(config.on_job_failure);
            workers.spawn(
                async move { (id, worker.run().await) }.instrument(info_span!("worker", id)),
            );
        }
        info!(size = config.worker_pool_size, "launched worker pool");
        Self {
            size: config.worker_pool_size,
            queue,
            cancel,
            workers,
            shutdown_timeout: config.shutdown_timeout,
            reports: Vec::new(),
        }
    }

    /// wait until every queued job is acknowledged, then shut the pool down
    /// stops waiting early if every worker has already terminated
    #[instrument(skip_all)]
    pub async fn drain_and_shutdown(mut self) -> PoolReport {
        info!(outstanding = self.queue.outstanding(), "waiting for queue to drain");
        loop {
            tokio::select! {
                _ = self.queue.await_drain() => {
                    info!("all jobs acknowledged");
                    break;
                }
                joined = self.workers.join_next() => match joined {
                    Some(joined) => self.record(joined),
                    None => {
                        warn!(
                            unacknowledged = self.queue.outstanding(),
                            "every worker terminated before the queue drained"
                        );
                        break;
                    }
                },
            }
        }
        self.shutdown().await
    }

    /// cancel every worker and wait for all of them to terminate
    /// without a shutdown timeout this waits as long as the slowest running job
    #[instrument(skip_all)]
    pub async fn shutdown(mut self) -> PoolReport {
        info!("cancelling workers");
        self.cancel.cancel();
        match self.shutdown_timeout {
            None => self.join_all().await,
            Some(limit) => {
                if timeout(limit, self.join_all()).await.is_err() {
                    warn!(
                        ?limit,
                        remaining = self.workers.len(),
                        "workers did not stop in time, aborting"
                    );
                    self.workers.abort_all();
                    self.join_all().await;
                }
            }
        }
        self.into_report()
    }

    async fn join_all(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: Result<(usize, WorkerExit), JoinError>) {
        match joined {
            Ok((id, exit)) => {
                info!(worker = id, ?exit, "worker terminated");
                self.reports.push(WorkerReport { id, exit });
            }
            // the missing id is filled in as aborted by into_report
            Err(err) if err.is_panic() => error!(%err, "worker panicked"),
            Err(err) => info!(%err, "worker aborted"),
        }
    }

    fn into_report(self) -> PoolReport {
        let mut workers = self.reports;
        let reported: HashSet<usize> = workers.iter().map(|report| report.id).collect();
        for id in (0..self.size).filter(|id| !reported.contains(id)) {
            workers.push(WorkerReport {
                id,
                exit: WorkerExit::Aborted,
            });
        }
        workers.sort_by_key(|report| report.id);
        PoolReport {
            workers,
            unacknowledged: self.queue.outstanding(),
        }
    }
}
