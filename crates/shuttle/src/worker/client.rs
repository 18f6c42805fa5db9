//! Enqueueing: plain, delayed, once-only and batched.

use std::sync::Arc;
use std::time::Duration;

use super::job::{Job, Queue};
use super::queue::JobQueue;
use super::registry::{BatchHandler, CallbackArgs, Worker};
use crate::coordination::{lock_name, BatchCallback, BatchOutcome, WorkCoordinator};
use crate::error::WorkerError;

#[derive(Clone)]
pub struct JobClient {
    queue: Arc<JobQueue>,
    coordinator: Arc<dyn WorkCoordinator>,
    lock_ttl: Duration,
}

impl JobClient {
    pub fn new(queue: Arc<JobQueue>, coordinator: Arc<dyn WorkCoordinator>, lock_ttl: Duration) -> Self {
        Self {
            queue,
            coordinator,
            lock_ttl,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn coordinator(&self) -> &Arc<dyn WorkCoordinator> {
        &self.coordinator
    }

    pub fn perform_async<W: Worker>(&self, args: &W::Args) -> Result<String, WorkerError> {
        self.enqueue::<W>(args, None)
    }

    pub fn perform_in<W: Worker>(&self, delay: Duration, args: &W::Args) -> Result<String, WorkerError> {
        let job = Job::new(W::CLASS, serde_json::to_value(args)?, W::QUEUE);
        let jid = job.jid.clone();
        self.queue.push_in(delay, job);
        Ok(jid)
    }

    /// Enqueues unless an identical job is already waiting to start.
    /// Returns `None` when deduplicated. An unreachable lock store degrades
    /// to a plain enqueue.
    pub fn perform_once<W: Worker>(&self, args: &W::Args) -> Result<Option<String>, WorkerError> {
        let name = lock_name(W::CLASS, args)?;
        let job = Job::new(W::CLASS, serde_json::to_value(args)?, W::QUEUE);
        match self.coordinator.try_lock(&name, self.lock_ttl) {
            Ok(true) => self.submit(job.with_lock(name)).map(Some),
            Ok(false) => {
                log::debug!("Skipping enqueue of {}: already queued", name);
                Ok(None)
            }
            Err(e) => {
                log::warn!("Lock store unavailable for {} ({}), enqueueing anyway", name, e);
                self.submit(job).map(Some)
            }
        }
    }

    pub(crate) fn enqueue<W: Worker>(
        &self,
        args: &W::Args,
        batch_id: Option<&str>,
    ) -> Result<String, WorkerError> {
        let job = Job::new(W::CLASS, serde_json::to_value(args)?, W::QUEUE).in_batch(batch_id);
        self.submit(job)
    }

    fn submit(&self, job: Job) -> Result<String, WorkerError> {
        if let Some(bid) = &job.batch_id {
            self.coordinator.batch_add_job(bid)?;
        }
        let jid = job.jid.clone();
        log::debug!("Enqueued {} ({}) on {:?}", job.class, jid, job.queue);
        self.queue.push(job);
        Ok(jid)
    }

    /// Opens a batch whose success callback is `H` with `context`.
    pub fn new_batch<H: BatchHandler>(
        &self,
        description: &str,
        context: &H::Context,
    ) -> Result<Batch<'_>, WorkerError> {
        let callback = BatchCallback::new(H::CLASS, serde_json::to_value(context)?);
        let bid = self.coordinator.create_batch(description, callback)?;
        log::debug!("Opened batch {} ({})", bid, description);
        Ok(Batch { client: self, bid })
    }

    /// Enqueues the success callback of a completed batch, or reports its failures.
    pub(crate) fn handle_batch_outcome(&self, outcome: BatchOutcome) {
        let BatchOutcome::Completed(status) = outcome else {
            return;
        };
        if status.failures > 0 {
            log::error!(
                "Batch {} ({}) finished with {} of {} job(s) failed; {} will not run",
                status.bid,
                status.description,
                status.failures,
                status.total,
                status.callback.handler
            );
            return;
        }
        let handler = status.callback.handler.clone();
        let args = CallbackArgs {
            context: status.callback.context.clone(),
            status,
        };
        match serde_json::to_value(&args) {
            Ok(value) => {
                log::info!("Batch {} complete, scheduling {}", args.status.bid, handler);
                self.queue.push(Job::new(&handler, value, Queue::High));
            }
            Err(e) => log::error!("Cannot serialize callback for batch {}: {}", args.status.bid, e),
        }
    }
}

/// An open batch. Its id is known before any job is added.
pub struct Batch<'a> {
    client: &'a JobClient,
    bid: String,
}

impl Batch<'_> {
    pub fn bid(&self) -> &str {
        &self.bid
    }

    /// Runs `f`, attributing every job it enqueues to this batch, then seals
    /// the batch. Sealing happens even when `f` fails part-way.
    pub fn jobs<F, E>(self, f: F) -> Result<String, E>
    where
        F: FnOnce(&BatchJobs<'_>) -> Result<(), E>,
        E: From<WorkerError>,
    {
        let scope = BatchJobs {
            client: self.client,
            bid: &self.bid,
        };
        let result = f(&scope);
        let outcome = self
            .client
            .coordinator
            .seal_batch(&self.bid)
            .map_err(WorkerError::from)?;
        self.client.handle_batch_outcome(outcome);
        result.map(|_| self.bid)
    }
}

pub struct BatchJobs<'a> {
    client: &'a JobClient,
    bid: &'a str,
}

impl BatchJobs<'_> {
    pub fn bid(&self) -> &str {
        self.bid
    }

    pub fn enqueue<W: Worker>(&self, args: &W::Args) -> Result<String, WorkerError> {
        self.client.enqueue::<W>(args, Some(self.bid))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{BatchStatus, MemoryCoordinator};
    use crate::error::JobError;
    use crate::worker::JobContext;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct PingArgs {
        id: i64,
    }

    struct Ping;

    impl Worker for Ping {
        type Args = PingArgs;
        const CLASS: &'static str = "Ping";

        fn perform(&self, _ctx: &JobContext<'_>, _args: Self::Args) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct Done;

    impl BatchHandler for Done {
        type Context = ();
        const CLASS: &'static str = "Done";

        fn on_success(&self, _ctx: &JobContext<'_>, _status: &BatchStatus, _context: ()) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn client() -> JobClient {
        JobClient::new(
            Arc::new(JobQueue::new()),
            Arc::new(MemoryCoordinator::new()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_perform_once_until_lock_released() {
        let client = client();
        let first = client.perform_once::<Ping>(&PingArgs { id: 1 }).unwrap();
        assert!(first.is_some());
        assert!(client.perform_once::<Ping>(&PingArgs { id: 1 }).unwrap().is_none());
        assert!(client.perform_once::<Ping>(&PingArgs { id: 2 }).unwrap().is_some());

        let job = client.queue().try_pop().unwrap();
        client.coordinator().unlock(job.lock_name.as_deref().unwrap()).unwrap();
        assert!(client.perform_once::<Ping>(&PingArgs { id: 1 }).unwrap().is_some());
    }

    #[test]
    fn test_perform_in_waits_for_delay() {
        let client = client();
        client
            .perform_in::<Ping>(Duration::from_secs(60), &PingArgs { id: 1 })
            .unwrap();
        assert!(client.queue().try_pop().is_none());
        assert!(client.queue().next_due_in().is_some());
    }

    #[test]
    fn test_empty_batch_completes_on_seal() {
        let client = client();
        let batch = client.new_batch::<Done>("nothing to do", &()).unwrap();
        batch.jobs(|_| Ok::<_, WorkerError>(())).unwrap();

        let callback = client.queue().try_pop().unwrap();
        assert_eq!(callback.class, "Done");
        assert_eq!(callback.queue, Queue::High);
    }

    #[test]
    fn test_batched_jobs_carry_the_batch_id() {
        let client = client();
        let batch = client.new_batch::<Done>("pings", &()).unwrap();
        let bid = batch
            .jobs(|b| {
                b.enqueue::<Ping>(&PingArgs { id: 1 })?;
                Ok::<_, WorkerError>(())
            })
            .unwrap();

        let job = client.queue().try_pop().unwrap();
        assert_eq!(job.batch_id.as_deref(), Some(bid.as_str()));
        assert!(client.queue().try_pop().is_none());
    }
}
