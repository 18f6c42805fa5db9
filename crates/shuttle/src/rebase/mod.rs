//! Paragraph rebasing for article and key-group re-imports.

pub mod diff;
mod rebaser;

pub use diff::{changed_neighbors, diff, DiffOp};
pub use rebaser::{RebaseOutcome, Rebaser};
