//! Shared test utilities for qobuz-dl integration tests.
//!
//! This module provides:
//! - In-memory fakes for every pipeline collaborator
//! - Builders for catalog fixtures and pipeline configurations
//! - `TestHarness` wiring the fakes into a `Pipeline` and a `JobQueue`

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
