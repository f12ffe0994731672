//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! bookkeeping engine test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Assembled books and template builders for scenarios
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators
//! - `logging`: One-time tracing subscriber setup for test runs

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;
pub mod logging;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
pub use logging::*;
