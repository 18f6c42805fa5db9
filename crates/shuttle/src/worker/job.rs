use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority class. Workers drain `High` before looking at `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Queue {
    High,
    Low,
}

/// One unit of queued work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub jid: String,
    pub class: String,
    pub args: Value,
    pub queue: Queue,
    /// Batch the job is attributed to, if any.
    pub batch_id: Option<String>,
    /// Zero on first delivery, incremented on every retry.
    pub attempt: u32,
    /// Enqueue-once lock released when the job starts.
    pub lock_name: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(class: &str, args: Value, queue: Queue) -> Self {
        Self {
            jid: uuid::Uuid::new_v4().to_string(),
            class: class.to_string(),
            args,
            queue,
            batch_id: None,
            attempt: 0,
            lock_name: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn in_batch(mut self, bid: Option<&str>) -> Self {
        self.batch_id = bid.map(str::to_string);
        self
    }

    pub fn with_lock(mut self, lock_name: String) -> Self {
        self.lock_name = Some(lock_name);
        self
    }

    /// Same job, next attempt. The jid is kept so worker sets stay consistent.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            lock_name: None,
            enqueued_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// A job that failed terminally, kept for operator introspection.
#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub jid: String,
    pub class: String,
    pub args: Value,
    pub batch_id: Option<String>,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedJob {
    pub fn new(job: &Job, error: &str) -> Self {
        Self {
            jid: job.jid.clone(),
            class: job.class.clone(),
            args: job.args.clone(),
            batch_id: job.batch_id.clone(),
            attempts: job.attempt + 1,
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}
