//! Calibrated magnitudes from a night's transformation coefficients.
//!
//! Per paired sample:
//!
//! ```text
//! calibrated_color  = c3·(B_obs - V_obs) + c4
//! calibrated_visual = V_obs + c1·calibrated_color + c2
//! calibrated_blue   = calibrated_color + calibrated_visual
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::domain::{
    CalibratedMeasurement, ColorFilters, Day, Diagnostic, DiagnosticKind, Diagnostics,
    ExtinctionCorrectedMeasurement, Stage, TransformationCoefficientRecord,
};
use crate::extinction::CorrectedSet;
use crate::transform::pairing::{pair_by_day, PairedSamples};
use crate::transform::TransformationTable;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSeries {
    pub object: String,
    /// Nights ascending; within a night all blue samples, then all visual.
    pub measurements: Vec<CalibratedMeasurement>,
}

/// Objects with at least one calibrated measurement, in observation order.
#[derive(Debug, Clone, Default)]
pub struct CalibratedSet {
    series: Vec<CalibratedSeries>,
    index: HashMap<String, usize>,
}

impl CalibratedSet {
    pub fn new(series: Vec<CalibratedSeries>) -> Self {
        let index = series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.object.clone(), i))
            .collect();
        Self { series, index }
    }

    pub fn get(&self, object: &str) -> Option<&CalibratedSeries> {
        self.index.get(object).map(|&i| &self.series[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibratedSeries> {
        self.series.iter()
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

/// Calibrate every object on every night that has coefficients.
pub fn apply_transformation(
    corrected: &CorrectedSet,
    table: &TransformationTable,
    color: &ColorFilters,
    diags: &mut Diagnostics,
) -> CalibratedSet {
    let mut uncovered: BTreeSet<Day> = BTreeSet::new();
    let mut out = Vec::new();

    for series in corrected.iter() {
        let mut measurements = Vec::new();

        for (day, paired) in pair_by_day(series, color) {
            let Some(record) = table.get(day) else {
                uncovered.insert(day);
                continue;
            };
            match paired {
                Ok(samples) => calibrate_night(record, &samples, &mut measurements),
                Err(err) => diags.push(
                    Diagnostic::new(
                        Stage::Calibration,
                        DiagnosticKind::MissingData,
                        format!("{err}; night not calibrated"),
                    )
                    .object(series.object.clone())
                    .day(day),
                ),
            }
        }

        if !measurements.is_empty() {
            out.push(CalibratedSeries {
                object: series.object.clone(),
                measurements,
            });
        }
    }

    for day in uncovered {
        diags.push(
            Diagnostic::new(
                Stage::Calibration,
                DiagnosticKind::MissingData,
                "no transformation coefficients for this night",
            )
            .day(day),
        );
    }

    let set = CalibratedSet::new(out);
    tracing::info!(
        objects = set.len(),
        measurements = set.measurement_count(),
        "calibration applied"
    );
    set
}

fn calibrate_night(
    record: &TransformationCoefficientRecord,
    samples: &PairedSamples<'_>,
    out: &mut Vec<CalibratedMeasurement>,
) {
    let mut visual = Vec::with_capacity(samples.len());

    for (b, v) in samples.pairs() {
        let color = record.c3 * (b.corrected - v.corrected) + record.c4;
        let cal_visual = v.corrected + record.c1 * color + record.c2;
        let cal_blue = color + cal_visual;

        out.push(calibrated(b, cal_blue));
        visual.push(calibrated(v, cal_visual));
    }
    out.extend(visual);
}

fn calibrated(m: &ExtinctionCorrectedMeasurement, value: f64) -> CalibratedMeasurement {
    CalibratedMeasurement {
        object: m.object.clone(),
        day: m.day,
        time: m.time,
        filter: m.filter.clone(),
        calibrated: value,
        corrected: m.corrected,
        instrumental: m.instrumental,
    }
}
