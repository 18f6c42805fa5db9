//! Shared test utilities for shuttle integration tests.
//!
//! This module provides:
//! - `TestHarness`, a `Shuttle` over an in-memory database with recording
//!   collaborators
//! - Builders for configs and projects

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{CollectingNotifier, MemorySource, RecordingSearch, TestHarness};
