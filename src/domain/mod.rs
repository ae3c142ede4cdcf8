//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observation nights (`Day`)
//! - catalog objects and per-image measurements
//! - coefficient records and derived magnitudes for each stage
//! - run configuration (`CalibrationConfig`, `CalibrationOptions`)
//! - non-fatal diagnostics

pub mod day;
pub mod diagnostics;
pub mod types;

pub use day::*;
pub use diagnostics::*;
pub use types::*;
