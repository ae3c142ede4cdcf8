//! Data sources besides real observations.

pub mod synthetic;

pub use synthetic::{generate_night, mjd, FilterModel, SimulationConfig, SyntheticNight, SyntheticObject};
