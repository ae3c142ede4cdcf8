//! Extinction correction of every measurement, standard or not.

use std::collections::{BTreeSet, HashMap};

use crate::aggregate::ObservationSet;
use crate::domain::{
    Day, Diagnostic, DiagnosticKind, Diagnostics, ExtinctionCorrectedMeasurement, ExtinctionTerm,
    Stage,
};
use crate::extinction::ExtinctionTable;

/// Corrected measurements of one object, time ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedSeries {
    pub object: String,
    pub is_standard: bool,
    pub measurements: Vec<ExtinctionCorrectedMeasurement>,
}

/// Per-object corrected series, in the same order as the observations.
#[derive(Debug, Clone, Default)]
pub struct CorrectedSet {
    series: Vec<CorrectedSeries>,
    index: HashMap<String, usize>,
}

impl CorrectedSet {
    pub fn new(series: Vec<CorrectedSeries>) -> Self {
        let index = series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.object.clone(), i))
            .collect();
        Self { series, index }
    }

    pub fn get(&self, object: &str) -> Option<&CorrectedSeries> {
        self.index.get(object).map(|&i| &self.series[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectedSeries> {
        self.series.iter()
    }

    pub fn standards(&self) -> impl Iterator<Item = &CorrectedSeries> {
        self.series.iter().filter(|s| s.is_standard)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn measurement_count(&self) -> usize {
        self.series.iter().map(|s| s.measurements.len()).sum()
    }
}

/// Correct every defined measurement with its night's coefficients.
///
/// Nights/filters without a record fall back to [`ExtinctionTerm::Neutral`];
/// each such (day, filter) is reported once.
pub fn correct_measurements(
    observations: &ObservationSet,
    table: &ExtinctionTable,
    diags: &mut Diagnostics,
) -> CorrectedSet {
    let mut uncovered: BTreeSet<(Day, String)> = BTreeSet::new();
    let mut out = Vec::with_capacity(observations.len());

    for series in observations.iter() {
        let mut measurements = Vec::with_capacity(series.measurements.len());

        for m in &series.measurements {
            let Some(instrumental) = m.magnitude else {
                diags.push(
                    Diagnostic::new(
                        Stage::Correction,
                        DiagnosticKind::InvalidSample,
                        format!("undefined magnitude at {} not corrected", m.time),
                    )
                    .object(series.object.clone())
                    .day(m.day)
                    .filter(m.filter.clone()),
                );
                continue;
            };

            let record = table.get(m.day, &m.filter);
            if record.is_none() {
                uncovered.insert((m.day, m.filter.clone()));
            }
            let term = ExtinctionTerm::from_record(record);

            measurements.push(ExtinctionCorrectedMeasurement {
                object: series.object.clone(),
                day: m.day,
                time: m.time,
                filter: m.filter.clone(),
                corrected: term.apply(instrumental, m.airmass),
                instrumental,
                magnitude_error: m.magnitude_error,
                airmass: m.airmass,
                term,
            });
        }

        out.push(CorrectedSeries {
            object: series.object.clone(),
            is_standard: series.is_standard,
            measurements,
        });
    }

    for (day, filter) in uncovered {
        diags.push(
            Diagnostic::new(
                Stage::Correction,
                DiagnosticKind::MissingData,
                "no extinction coefficients; magnitudes left uncorrected",
            )
            .day(day)
            .filter(filter),
        );
    }

    let set = CorrectedSet::new(out);
    tracing::info!(measurements = set.measurement_count(), "extinction correction applied");
    set
}
