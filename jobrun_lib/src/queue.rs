use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{watch, Notify};
use tracing::debug;

use crate::{
    error::{JobRunError, Result},
    job::Job,
};

/// Bounded FIFO of pending jobs with a completion barrier.
///
/// Every pushed job counts as outstanding until a worker acknowledges it,
/// [`JobQueue::await_drain`] resolves once nothing is outstanding.
pub struct JobQueue {
    capacity: usize,
    // only ever locked for synchronous access, never across an await
    pending: Mutex<VecDeque<Job>>,
    job_available: Notify,
    outstanding: watch::Sender<usize>,
}

impl JobQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            capacity,
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            job_available: Notify::new(),
            outstanding,
        }
    }

    /// enqueue without waiting, fails if `capacity` jobs are already waiting
    pub fn push(&self, job: Job) -> Result<()> {
        {
            let mut pending = self.lock_pending();
            if pending.len() >= self.capacity {
                return Err(JobRunError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
            pending.push_back(job);
            self.outstanding.send_modify(|count| *count += 1);
        }
        self.job_available.notify_one();
        Ok(())
    }

    /// wait for the next job
    /// cancel safe, dropping the future never loses a job
    pub async fn pop(&self) -> Job {
        loop {
            let notified = self.job_available.notified();
            let next = self.lock_pending().pop_front();
            if let Some(job) = next {
                debug!(command = job.command(), "read job from queue");
                return job;
            }
            notified.await;
        }
    }

    /// mark one popped job as done
    pub fn acknowledge(&self) -> Result<()> {
        let mut result = Ok(());
        self.outstanding.send_if_modified(|count| {
            if *count == 0 {
                result = Err(JobRunError::Overacknowledged);
                false
            } else {
                *count -= 1;
                true
            }
        });
        result
    }

    /// resolves once every pushed job has been acknowledged
    pub async fn await_drain(&self) {
        let mut outstanding = self.outstanding.subscribe();
        // the sender lives in self, so the channel cannot close while we wait
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    /// jobs pushed but not yet acknowledged
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// jobs waiting to be popped
    pub fn len(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
