//! Background job execution.

pub mod client;
pub mod context;
pub mod job;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod runner;

pub use client::{Batch, BatchJobs, JobClient};
pub use context::JobContext;
pub use job::{FailedJob, Job, Queue};
pub use pool::WorkerPool;
pub use queue::JobQueue;
pub use registry::{BatchHandler, CallbackArgs, JobRegistry, Worker};
pub use runner::{JobOutcome, JobRunner};
