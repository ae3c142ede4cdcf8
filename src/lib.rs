//! `photcal` library crate.
//!
//! Photometric calibration of instrumental magnitudes: per-night atmospheric
//! extinction from standard stars, then a per-night colour transformation onto
//! the standard system. The binary (`photcal`) is a thin wrapper so the whole
//! pipeline is testable in-process.

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod extinction;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod transform;
