//! Extinction coefficient estimation.
//!
//! For standard objects only:
//!
//! 1. every defined measurement with a catalog magnitude in its filter gives a
//!    sample `delta = instrumental - standard` at its airmass
//! 2. samples are grouped into gate sets (object and night, optionally also
//!    filter); each set is fitted `delta = slope·airmass + intercept` and kept
//!    only if `slope > 0`
//! 3. samples of all accepted sets are pooled by (night, filter) and refitted;
//!    each pooled fit becomes an [`ExtinctionCoefficientRecord`]

use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::ObservationSet;
use crate::domain::{
    CalibrationOptions, Catalog, Day, Diagnostic, DiagnosticKind, Diagnostics,
    ExtinctionCoefficientRecord, GateScope, Stage,
};
use crate::extinction::ExtinctionTable;
use crate::math::{fit_line, map_groups, LineFit};

/// One standard-object measurement usable for extinction fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtinctionSample {
    pub object: String,
    pub day: Day,
    pub filter: String,
    pub airmass: f64,
    /// `instrumental - standard`
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GateKey {
    object: String,
    day: Day,
    filter: Option<String>,
}

enum GateOutcome {
    Accepted,
    TooFew(usize),
    Failed(String),
    NonPositive(f64),
}

/// Estimate the extinction table for all nights and filters.
pub fn estimate_extinction(
    catalog: &Catalog,
    observations: &ObservationSet,
    options: &CalibrationOptions,
    diags: &mut Diagnostics,
) -> ExtinctionTable {
    let samples = collect_samples(catalog, observations, diags);
    let accepted = gate_samples(samples, options, diags);
    let table = pooled_fit(accepted, options.parallel, diags);

    if table.is_empty() {
        tracing::warn!("no extinction coefficients could be computed");
    } else {
        tracing::info!(records = table.len(), "extinction coefficients estimated");
    }
    table
}

/// Gather samples from standard objects.
///
/// A standard without a catalog magnitude in some filter it was observed in
/// contributes nothing for that filter (one diagnostic per object and filter).
pub fn collect_samples(
    catalog: &Catalog,
    observations: &ObservationSet,
    diags: &mut Diagnostics,
) -> Vec<ExtinctionSample> {
    let mut samples = Vec::new();

    for series in observations.standards() {
        let Some(object) = catalog.get(&series.object) else {
            continue;
        };
        let mut unreferenced: BTreeSet<&str> = BTreeSet::new();

        for m in series.defined() {
            let (Some(instrumental), Some(standard)) = (m.magnitude, object.standard_mag(&m.filter)) else {
                unreferenced.insert(&m.filter);
                continue;
            };
            samples.push(ExtinctionSample {
                object: series.object.clone(),
                day: m.day,
                filter: m.filter.clone(),
                airmass: m.airmass,
                delta: instrumental - standard,
            });
        }

        for filter in unreferenced {
            diags.push(
                Diagnostic::new(
                    Stage::Extinction,
                    DiagnosticKind::MissingData,
                    "no standard magnitude in this filter",
                )
                .object(series.object.clone())
                .filter(filter),
            );
        }
    }
    samples
}

/// Apply the per-set slope gate; returns the samples of accepted sets.
fn gate_samples(
    samples: Vec<ExtinctionSample>,
    options: &CalibrationOptions,
    diags: &mut Diagnostics,
) -> Vec<ExtinctionSample> {
    let mut sets: BTreeMap<GateKey, Vec<ExtinctionSample>> = BTreeMap::new();
    for s in samples {
        let key = GateKey {
            object: s.object.clone(),
            day: s.day,
            filter: match options.gate_scope {
                GateScope::ObjectDay => None,
                GateScope::ObjectDayFilter => Some(s.filter.clone()),
            },
        };
        sets.entry(key).or_default().push(s);
    }
    let sets: Vec<(GateKey, Vec<ExtinctionSample>)> = sets.into_iter().collect();

    let min = options.min_gate_samples;
    let outcomes = map_groups(&sets, options.parallel, |(_, set)| gate_outcome(set, min));

    let mut accepted = Vec::new();
    for ((key, set), outcome) in sets.into_iter().zip(outcomes) {
        let (kind, message) = match outcome {
            GateOutcome::Accepted => {
                accepted.extend(set);
                continue;
            }
            GateOutcome::TooFew(n) => (
                DiagnosticKind::InvalidSample,
                format!("gate set discarded: {n} samples, at least {min} required"),
            ),
            GateOutcome::Failed(reason) => (
                DiagnosticKind::RegressionFailed,
                format!("gate set discarded: {reason}"),
            ),
            GateOutcome::NonPositive(slope) => (
                DiagnosticKind::InvalidSample,
                format!("gate set discarded: non-positive extinction slope {slope:.5}"),
            ),
        };

        let mut d = Diagnostic::new(Stage::Extinction, kind, message)
            .object(key.object)
            .day(key.day);
        if let Some(filter) = key.filter {
            d = d.filter(filter);
        }
        diags.push(d);
    }
    accepted
}

fn gate_outcome(set: &[ExtinctionSample], min_samples: usize) -> GateOutcome {
    if set.len() < min_samples {
        return GateOutcome::TooFew(set.len());
    }
    match fit_samples(set) {
        Err(reason) => GateOutcome::Failed(reason),
        Ok(fit) if fit.slope > 0.0 => GateOutcome::Accepted,
        Ok(fit) => GateOutcome::NonPositive(fit.slope),
    }
}

fn fit_samples(samples: &[ExtinctionSample]) -> Result<LineFit, String> {
    let xs: Vec<f64> = samples.iter().map(|s| s.airmass).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.delta).collect();
    fit_line(&xs, &ys).map_err(|e| e.message().to_string())
}

/// Refit the accepted samples pooled by (day, filter).
fn pooled_fit(accepted: Vec<ExtinctionSample>, parallel: bool, diags: &mut Diagnostics) -> ExtinctionTable {
    let mut pools: BTreeMap<(Day, String), Vec<ExtinctionSample>> = BTreeMap::new();
    for s in accepted {
        pools.entry((s.day, s.filter.clone())).or_default().push(s);
    }
    let pools: Vec<((Day, String), Vec<ExtinctionSample>)> = pools.into_iter().collect();

    let fits = map_groups(&pools, parallel, |(_, samples)| fit_samples(samples));

    let mut table = ExtinctionTable::new();
    for (((day, filter), samples), fit) in pools.into_iter().zip(fits) {
        match fit {
            Ok(fit) => {
                let objects: BTreeSet<String> = samples.iter().map(|s| s.object.clone()).collect();
                tracing::debug!(
                    %day,
                    filter = %filter,
                    slope = fit.slope,
                    intercept = fit.intercept,
                    n = fit.n,
                    "pooled extinction fit"
                );
                table.insert(ExtinctionCoefficientRecord {
                    day,
                    filter,
                    slope: fit.slope,
                    intercept: fit.intercept,
                    r: fit.r,
                    n_samples: fit.n,
                    objects: objects.into_iter().collect(),
                });
            }
            Err(reason) => diags.push(
                Diagnostic::new(
                    Stage::Extinction,
                    DiagnosticKind::RegressionFailed,
                    format!("pooled fit over {} samples failed: {reason}", samples.len()),
                )
                .day(day)
                .filter(filter),
            ),
        }
    }
    table
}
