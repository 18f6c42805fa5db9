//! In-process job broker with two priorities and a delayed set.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver, Sender};

use super::job::{Job, Queue};

pub struct JobQueue {
    high_tx: Sender<Job>,
    high_rx: Receiver<Job>,
    low_tx: Sender<Job>,
    low_rx: Receiver<Job>,
    scheduled: Mutex<Vec<(Instant, Job)>>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (high_tx, high_rx) = unbounded();
        let (low_tx, low_rx) = unbounded();
        Self {
            high_tx,
            high_rx,
            low_tx,
            low_rx,
            scheduled: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, job: Job) {
        let sender = match job.queue {
            Queue::High => &self.high_tx,
            Queue::Low => &self.low_tx,
        };
        // Both receivers live as long as the queue, so send cannot fail.
        let _ = sender.send(job);
    }

    /// Holds `job` back until `delay` has elapsed.
    pub fn push_in(&self, delay: Duration, job: Job) {
        if delay.is_zero() {
            self.push(job);
            return;
        }
        match self.scheduled.lock() {
            Ok(mut scheduled) => scheduled.push((Instant::now() + delay, job)),
            Err(poisoned) => poisoned.into_inner().push((Instant::now() + delay, job)),
        }
    }

    fn promote_due(&self) {
        let now = Instant::now();
        let due: Vec<Job> = {
            let mut scheduled = match self.scheduled.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let (due, later): (Vec<_>, Vec<_>) =
                scheduled.drain(..).partition(|(at, _)| *at <= now);
            *scheduled = later;
            due.into_iter().map(|(_, job)| job).collect()
        };
        for job in due {
            self.push(job);
        }
    }

    /// Time until the next delayed job is due, if any are waiting.
    pub fn next_due_in(&self) -> Option<Duration> {
        let scheduled = match self.scheduled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        scheduled
            .iter()
            .map(|(at, _)| at.saturating_duration_since(now))
            .min()
    }

    /// Next ready job, high priority first, without blocking.
    pub fn try_pop(&self) -> Option<Job> {
        self.promote_due();
        self.high_rx
            .try_recv()
            .or_else(|_| self.low_rx.try_recv())
            .ok()
    }

    /// Waits up to `timeout` for a job.
    pub fn pop(&self, timeout: Duration) -> Option<Job> {
        if let Some(job) = self.try_pop() {
            return Some(job);
        }
        let wait = self
            .next_due_in()
            .map(|due| due.min(timeout))
            .unwrap_or(timeout);
        select! {
            recv(self.high_rx) -> job => job.ok(),
            recv(self.low_rx) -> job => job.ok(),
            default(wait) => self.try_pop(),
        }
    }

    /// Ready jobs plus delayed ones.
    pub fn len(&self) -> usize {
        let scheduled = match self.scheduled.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        self.high_rx.len() + self.low_rx.len() + scheduled
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
