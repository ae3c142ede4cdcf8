//! Atmospheric extinction.
//!
//! - [`estimator`]: per-night, per-filter extinction coefficients from
//!   standard objects (per-object slope gate, then a pooled refit)
//! - [`corrector`]: applies those coefficients to every measurement

pub mod corrector;
pub mod estimator;

use std::collections::BTreeMap;

use crate::domain::{Day, ExtinctionCoefficientRecord};

pub use corrector::{correct_measurements, CorrectedSeries, CorrectedSet};
pub use estimator::{estimate_extinction, ExtinctionSample};

/// Coefficient records keyed by (day, filter). At most one record per key.
#[derive(Debug, Clone, Default)]
pub struct ExtinctionTable {
    records: BTreeMap<(Day, String), ExtinctionCoefficientRecord>,
}

impl ExtinctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous one for the same key.
    pub fn insert(&mut self, record: ExtinctionCoefficientRecord) {
        self.records
            .insert((record.day, record.filter.clone()), record);
    }

    pub fn get(&self, day: Day, filter: &str) -> Option<&ExtinctionCoefficientRecord> {
        self.records.get(&(day, filter.to_string()))
    }

    /// Records in (day, filter) order.
    pub fn records(&self) -> impl Iterator<Item = &ExtinctionCoefficientRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ExtinctionCoefficientRecord> for ExtinctionTable {
    fn from_iter<I: IntoIterator<Item = ExtinctionCoefficientRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}
