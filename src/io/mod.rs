//! Input/output helpers.
//!
//! - catalog loading (`catalog`)
//! - explicit source identities (`identity`)
//! - per-image photometry files (`photometry`)
//! - per-object result files (`export`) and the run summary JSON (`summary`)
//! - calibrated and differential series read-back for plotting (`series`)

pub mod catalog;
pub mod export;
pub mod identity;
pub mod photometry;
pub mod series;
pub mod summary;

pub use catalog::{load_catalog, parse_catalog};
pub use export::{write_object_outputs, ExportStats};
pub use identity::IdentityMap;
pub use photometry::{scan_photometry, PhotometryRow, PhotometryScan};
pub use series::{
    differential_curve, is_field_series, read_calibrated_series, read_differential_series, CurvePoint,
};
pub use summary::write_summary;
