//! Coordination primitives: enqueue-once locks, worker-set tracking and
//! batch counters.

pub mod batch;
pub mod coordinator;
pub mod lock;
pub mod tracker;

pub use batch::{BatchCallback, BatchOutcome, BatchStatus};
pub use coordinator::{MemoryCoordinator, WorkCoordinator};
pub use lock::lock_name;
pub use tracker::{worker_set_key, TrackedEntity, WorkerTracker};
