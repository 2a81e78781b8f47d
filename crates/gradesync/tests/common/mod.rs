//! Shared test utilities for gradesync integration tests.
//!
//! This module provides:
//! - `MockGradebook`, an in-memory gradebook implementing `GradebookClient`
//! - Builders for declared trees, observed snapshots and fast executors

#![allow(unused_imports)]

pub mod builders;
pub mod mock;

pub use builders::*;
pub use mock::{Fault, MockGradebook, MockSessionProvider, RecordingObserver};
