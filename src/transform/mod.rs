//! Colour transformation onto the standard system.
//!
//! - [`pairing`]: blue/visual sample pairing shared by both stages
//! - [`estimator`]: per-night coefficients from paired standard objects
//! - [`applier`]: calibrated magnitudes for every object

pub mod applier;
pub mod estimator;
pub mod pairing;

use std::collections::BTreeMap;

use crate::domain::{Day, TransformationCoefficientRecord};

pub use applier::{apply_transformation, CalibratedSeries, CalibratedSet};
pub use estimator::estimate_transformation;
pub use pairing::{pair_by_day, PairedSamples, PairingError};

/// Transformation records keyed by night.
#[derive(Debug, Clone, Default)]
pub struct TransformationTable {
    records: BTreeMap<Day, TransformationCoefficientRecord>,
}

impl TransformationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: TransformationCoefficientRecord) {
        self.records.insert(record.day, record);
    }

    pub fn get(&self, day: Day) -> Option<&TransformationCoefficientRecord> {
        self.records.get(&day)
    }

    pub fn records(&self) -> impl Iterator<Item = &TransformationCoefficientRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<TransformationCoefficientRecord> for TransformationTable {
    fn from_iter<I: IntoIterator<Item = TransformationCoefficientRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}
