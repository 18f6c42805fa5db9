//! Lock names for enqueue-once deduplication.

use serde::Serialize;

use crate::error::WorkerError;

/// `<Class>:<json of args>`. Two enqueues of the same class with equal
/// arguments map to the same name.
pub fn lock_name<A: Serialize>(class: &str, args: &A) -> Result<String, WorkerError> {
    Ok(format!("{}:{}", class, serde_json::to_string(args)?))
}
