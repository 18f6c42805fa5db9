//! Executes jobs: lock release, tracing span, retry policy and batch accounting.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error, info, info_span, warn};

use super::context::JobContext;
use super::job::{FailedJob, Job};
use super::registry::JobRegistry;
use crate::error::JobError;
use crate::services::Services;

/// How a single delivery of a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// The job's subject no longer exists; counted as success.
    Moot,
    /// Rescheduled after a transient failure.
    Retrying,
    Failed,
}

pub struct JobRunner {
    services: Arc<Services>,
    registry: Arc<JobRegistry>,
    failures: Mutex<Vec<FailedJob>>,
}

impl JobRunner {
    pub fn new(services: Arc<Services>, registry: Arc<JobRegistry>) -> Self {
        Self {
            services,
            registry,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn run_job(&self, job: Job) -> JobOutcome {
        let _span = info_span!(
            "job",
            class = %job.class,
            jid = %job.jid,
            attempt = job.attempt
        )
        .entered();

        // Released at start: a perform_once issued from here on enqueues a new run.
        if let Some(name) = &job.lock_name {
            if let Err(e) = self.services.coordinator.unlock(name) {
                warn!("Failed to release lock {}: {}", name, e);
            }
        }

        let result = match self.registry.get(&job.class) {
            Some(handler) => {
                let ctx = JobContext::new(&job, &self.services);
                panic::catch_unwind(AssertUnwindSafe(|| handler.run(&ctx, job.args.clone())))
                    .unwrap_or_else(|payload| Err(JobError::Fatal(panic_message(payload))))
            }
            None => Err(JobError::Fatal(format!("no job registered as {}", job.class))),
        };

        let max_retries = self.services.config.jobs.max_retries;
        match result {
            Ok(()) => {
                debug!("{} {} done", job.class, job.jid);
                self.finish(&job, true);
                JobOutcome::Succeeded
            }
            Err(JobError::NotFound(what)) => {
                info!("{} {} is moot: {}", job.class, job.jid, what);
                self.finish(&job, true);
                JobOutcome::Moot
            }
            Err(JobError::Transient(reason)) if job.attempt < max_retries => {
                let delay = self.services.config.jobs.backoff_for(job.attempt);
                warn!(
                    "{} {} failed transiently ({}), retry {}/{} in {:?}",
                    job.class,
                    job.jid,
                    reason,
                    job.attempt + 1,
                    max_retries,
                    delay
                );
                self.services.client.queue().push_in(delay, job.retry());
                JobOutcome::Retrying
            }
            Err(e) => {
                if let JobError::Invariant(_) = e {
                    error!("{} {} aborted: {}", job.class, job.jid, e);
                } else {
                    error!("{} {} failed after {} attempt(s): {}", job.class, job.jid, job.attempt + 1, e);
                }
                self.record_failure(FailedJob::new(&job, &e.to_string()));
                self.finish(&job, false);
                JobOutcome::Failed
            }
        }
    }

    fn finish(&self, job: &Job, success: bool) {
        let Some(bid) = &job.batch_id else {
            return;
        };
        match self.services.coordinator.batch_job_finished(bid, success) {
            Ok(outcome) => self.services.client.handle_batch_outcome(outcome),
            Err(e) => error!("Failed to record {} in batch {}: {}", job.jid, bid, e),
        }
    }

    fn record_failure(&self, failure: FailedJob) {
        match self.failures.lock() {
            Ok(mut failures) => failures.push(failure),
            Err(poisoned) => poisoned.into_inner().push(failure),
        }
    }

    /// Terminal failures since startup, oldest first.
    pub fn failed_jobs(&self) -> Vec<FailedJob> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runs queued jobs on the calling thread until nothing is ready or
    /// scheduled. Returns the number of deliveries.
    pub fn run_until_idle(&self) -> usize {
        let queue = Arc::clone(self.services.client.queue());
        let mut ran = 0;
        loop {
            if let Some(job) = queue.try_pop() {
                self.run_job(job);
                ran += 1;
                continue;
            }
            match queue.next_due_in() {
                Some(wait) => thread::sleep(wait),
                None => break,
            }
        }
        ran
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
