use super::client::{Batch, JobClient};
use super::job::Job;
use super::registry::{BatchHandler, Worker};
use crate::db::Database;
use crate::error::{CoordinatorError, WorkerError};
use crate::services::Services;

/// What a running job can see: its own identity and the shared services.
pub struct JobContext<'a> {
    job: &'a Job,
    services: &'a Services,
}

impl<'a> JobContext<'a> {
    pub fn new(job: &'a Job, services: &'a Services) -> Self {
        Self { job, services }
    }

    pub fn jid(&self) -> &'a str {
        &self.job.jid
    }

    pub fn attempt(&self) -> u32 {
        self.job.attempt
    }

    /// True when a transient failure now would not be retried.
    pub fn is_final_attempt(&self) -> bool {
        self.job.attempt >= self.services.config.jobs.max_retries
    }

    pub fn batch_id(&self) -> Option<&'a str> {
        self.job.batch_id.as_deref()
    }

    pub fn services(&self) -> &'a Services {
        self.services
    }

    pub fn db(&self) -> &'a Database {
        &self.services.db
    }

    pub fn client(&self) -> &'a JobClient {
        &self.services.client
    }

    /// Enqueues a follow-up job, attributed to this job's batch if it has one.
    pub fn enqueue<W: Worker>(&self, args: &W::Args) -> Result<String, WorkerError> {
        self.services.client.enqueue::<W>(args, self.batch_id())
    }

    /// Enqueue-once. Never attributed to a batch: a deduplicated job may
    /// already belong to another one.
    pub fn perform_once<W: Worker>(&self, args: &W::Args) -> Result<Option<String>, WorkerError> {
        self.services.client.perform_once::<W>(args)
    }

    /// Opens a batch. Not allowed from a job that itself runs in a batch.
    pub fn new_batch<H: BatchHandler>(
        &self,
        description: &str,
        context: &H::Context,
    ) -> Result<Batch<'a>, WorkerError> {
        if let Some(bid) = self.batch_id() {
            return Err(CoordinatorError::NestedBatch(bid.to_string()).into());
        }
        self.services.client.new_batch::<H>(description, context)
    }
}
