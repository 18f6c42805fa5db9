//! Typed job definitions and the class-name registry the runner dispatches on.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::JobContext;
use super::job::Queue;
use crate::coordination::BatchStatus;
use crate::error::JobError;

/// A background job with typed arguments. Implementations must be safe to
/// run more than once with the same arguments.
pub trait Worker: Send + Sync + 'static {
    type Args: Serialize + DeserializeOwned;
    const CLASS: &'static str;
    const QUEUE: Queue = Queue::Low;

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError>;
}

/// Success callback of a batch. Runs once, on the high queue, with the
/// context recorded when the batch was opened.
pub trait BatchHandler: Send + Sync + 'static {
    type Context: Serialize + DeserializeOwned;
    const CLASS: &'static str;

    fn on_success(
        &self,
        ctx: &JobContext<'_>,
        status: &BatchStatus,
        context: Self::Context,
    ) -> Result<(), JobError>;
}

/// Arguments of a batch callback job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackArgs {
    pub status: BatchStatus,
    pub context: Value,
}

pub(crate) trait ErasedJob: Send + Sync {
    fn run(&self, ctx: &JobContext<'_>, args: Value) -> Result<(), JobError>;
}

struct WorkerJob<W>(W);

impl<W: Worker> ErasedJob for WorkerJob<W> {
    fn run(&self, ctx: &JobContext<'_>, args: Value) -> Result<(), JobError> {
        let args: W::Args = serde_json::from_value(args)?;
        self.0.perform(ctx, args)
    }
}

struct HandlerJob<H>(H);

impl<H: BatchHandler> ErasedJob for HandlerJob<H> {
    fn run(&self, ctx: &JobContext<'_>, args: Value) -> Result<(), JobError> {
        let CallbackArgs { status, context } = serde_json::from_value(args)?;
        let context: H::Context = serde_json::from_value(context)?;
        self.0.on_success(ctx, &status, context)
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Box<dyn ErasedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<W: Worker>(&mut self, worker: W) -> &mut Self {
        self.jobs.insert(W::CLASS, Box::new(WorkerJob(worker)));
        self
    }

    pub fn register_handler<H: BatchHandler>(&mut self, handler: H) -> &mut Self {
        self.jobs.insert(H::CLASS, Box::new(HandlerJob(handler)));
        self
    }

    pub(crate) fn get(&self, class: &str) -> Option<&dyn ErasedJob> {
        self.jobs.get(class).map(|job| job.as_ref())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.jobs.contains_key(class)
    }

    pub fn classes(&self) -> Vec<&'static str> {
        let mut classes: Vec<_> = self.jobs.keys().copied().collect();
        classes.sort_unstable();
        classes
    }
}
