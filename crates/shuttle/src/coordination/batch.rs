//! Batch bookkeeping types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The handler invoked when a batch completes without failures, plus the
/// context it reconstructs its state from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCallback {
    pub handler: String,
    #[serde(default)]
    pub context: Value,
}

impl BatchCallback {
    pub fn new(handler: &str, context: Value) -> Self {
        Self {
            handler: handler.to_string(),
            context,
        }
    }
}

/// Snapshot of a batch's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub bid: String,
    pub description: String,
    pub total: usize,
    pub pending: usize,
    pub failures: usize,
    pub sealed: bool,
    pub complete: bool,
    pub callback: BatchCallback,
}

impl BatchStatus {
    pub fn succeeded(&self) -> bool {
        self.complete && self.failures == 0
    }
}

/// Result of a batch mutation. `Completed` is returned to exactly one caller.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Pending,
    Completed(BatchStatus),
}

/// Mutable batch state held by a coordinator.
#[derive(Debug, Clone)]
pub(crate) struct BatchState {
    pub description: String,
    pub callback: BatchCallback,
    pub total: usize,
    pub pending: usize,
    pub failures: usize,
    pub sealed: bool,
    pub complete: bool,
}

impl BatchState {
    pub fn new(description: &str, callback: BatchCallback) -> Self {
        Self {
            description: description.to_string(),
            callback,
            total: 0,
            pending: 0,
            failures: 0,
            sealed: false,
            complete: false,
        }
    }

    pub fn status(&self, bid: &str) -> BatchStatus {
        BatchStatus {
            bid: bid.to_string(),
            description: self.description.clone(),
            total: self.total,
            pending: self.pending,
            failures: self.failures,
            sealed: self.sealed,
            complete: self.complete,
            callback: self.callback.clone(),
        }
    }

    /// Flips to complete when sealed and drained. Only the first caller to
    /// observe the transition gets `Completed`.
    pub fn check_completion(&mut self, bid: &str) -> BatchOutcome {
        if self.sealed && self.pending == 0 && !self.complete {
            self.complete = true;
            BatchOutcome::Completed(self.status(bid))
        } else {
            BatchOutcome::Pending
        }
    }
}
