use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use super::runner::JobRunner;
use crate::error::WorkerError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of threads pulling from the job queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(runner: Arc<JobRunner>, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let runner = Arc::clone(&runner);
            let shutdown_flag = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("shuttle-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, runner, shutdown_flag))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self { workers, shutdown })
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins every worker. Call after `shutdown`; jobs in flight finish first.
    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(worker_id: usize, runner: Arc<JobRunner>, shutdown: Arc<AtomicBool>) {
    debug!("Worker {} started", worker_id);

    let queue = Arc::clone(runner.services().client.queue());
    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        if let Some(job) = queue.pop(POLL_INTERVAL) {
            debug!("Worker {} picked up {} ({})", worker_id, job.class, job.jid);
            runner.run_job(job);
        }
    }

    debug!("Worker {} stopped", worker_id);
}
