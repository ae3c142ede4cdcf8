//! Per-night transformation coefficients from standard objects.
//!
//! Each qualifying standard contributes one point per night: its mean
//! corrected blue and visual magnitudes (paired samples only) and its catalog
//! magnitudes. With at least two such standards on a night we fit
//!
//! - `(V_std - V_obs) = c1·(B-V)_std + c2`
//! - `(B-V)_std = c3·(B-V)_obs + c4`

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    CalibrationOptions, Catalog, Day, Diagnostic, DiagnosticKind, Diagnostics, Stage,
    TransformationCoefficientRecord,
};
use crate::error::AppError;
use crate::extinction::CorrectedSet;
use crate::math::{fit_line, map_groups};
use crate::transform::pairing::pair_by_day;
use crate::transform::TransformationTable;

/// Fewest standards a night needs for a transformation fit.
pub const MIN_STANDARDS_PER_DAY: usize = 2;

/// One standard object's contribution to a night's fit.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardPoint {
    pub object: String,
    pub observed_color: f64,
    pub observed_visual: f64,
    pub standard_color: f64,
    pub standard_visual: f64,
}

pub fn estimate_transformation(
    catalog: &Catalog,
    corrected: &CorrectedSet,
    options: &CalibrationOptions,
    diags: &mut Diagnostics,
) -> TransformationTable {
    let nights = collect_points(catalog, corrected, options, diags);
    let nights: Vec<(Day, Vec<StandardPoint>)> = nights.into_iter().collect();

    let fits = map_groups(&nights, options.parallel, |(day, points)| fit_day(*day, points));

    let mut table = TransformationTable::new();
    for ((day, points), fit) in nights.into_iter().zip(fits) {
        match fit {
            Ok(record) => {
                tracing::debug!(
                    %day,
                    c1 = record.c1,
                    c2 = record.c2,
                    c3 = record.c3,
                    c4 = record.c4,
                    standards = record.objects.len(),
                    "transformation fit"
                );
                table.insert(record);
            }
            Err((kind, message)) => diags.push(
                Diagnostic::new(
                    Stage::Transformation,
                    kind,
                    format!("{message} ({} qualifying standards)", points.len()),
                )
                .day(day),
            ),
        }
    }

    if table.is_empty() {
        tracing::warn!("no night has enough paired standards for a transformation fit");
    } else {
        tracing::info!(nights = table.len(), "transformation coefficients estimated");
    }
    table
}

/// Per-night standard points. Every night any standard was observed on is
/// present, possibly with no points.
pub fn collect_points(
    catalog: &Catalog,
    corrected: &CorrectedSet,
    options: &CalibrationOptions,
    diags: &mut Diagnostics,
) -> BTreeMap<Day, Vec<StandardPoint>> {
    let color = &options.color;
    let mut nights: BTreeMap<Day, Vec<StandardPoint>> = BTreeMap::new();

    for series in corrected.standards() {
        let days: BTreeSet<Day> = series.measurements.iter().map(|m| m.day).collect();
        for &day in &days {
            nights.entry(day).or_default();
        }

        let reference = catalog
            .get(&series.object)
            .and_then(|o| Some((o.standard_mag(&color.blue)?, o.standard_mag(&color.visual)?)));
        let Some((std_blue, std_visual)) = reference else {
            diags.push(
                Diagnostic::new(
                    Stage::Transformation,
                    DiagnosticKind::MissingData,
                    format!(
                        "no standard magnitude in {} and {}; not used for transformation",
                        color.blue, color.visual
                    ),
                )
                .object(series.object.clone()),
            );
            continue;
        };

        for (day, paired) in pair_by_day(series, color) {
            match paired {
                Ok(samples) => {
                    if let Some(points) = nights.get_mut(&day) {
                        points.push(StandardPoint {
                            object: series.object.clone(),
                            observed_color: samples.observed_color(),
                            observed_visual: samples.mean_visual(),
                            standard_color: std_blue - std_visual,
                            standard_visual: std_visual,
                        });
                    }
                }
                Err(err) => diags.push(
                    Diagnostic::new(Stage::Transformation, DiagnosticKind::MissingData, err.to_string())
                        .object(series.object.clone())
                        .day(day),
                ),
            }
        }
    }
    nights
}

fn fit_day(day: Day, points: &[StandardPoint]) -> Result<TransformationCoefficientRecord, (DiagnosticKind, String)> {
    if points.len() < MIN_STANDARDS_PER_DAY {
        return Err((
            DiagnosticKind::MissingData,
            format!("at least {MIN_STANDARDS_PER_DAY} paired standards required"),
        ));
    }

    let std_color: Vec<f64> = points.iter().map(|p| p.standard_color).collect();
    let obs_color: Vec<f64> = points.iter().map(|p| p.observed_color).collect();
    let visual_offset: Vec<f64> = points
        .iter()
        .map(|p| p.standard_visual - p.observed_visual)
        .collect();

    let failed = |what: &str, e: AppError| {
        (DiagnosticKind::RegressionFailed, format!("{what} fit failed: {}", e.message()))
    };
    let magnitude = fit_line(&std_color, &visual_offset).map_err(|e| failed("magnitude", e))?;
    let colour = fit_line(&obs_color, &std_color).map_err(|e| failed("colour", e))?;

    Ok(TransformationCoefficientRecord {
        day,
        c1: magnitude.slope,
        c2: magnitude.intercept,
        c3: colour.slope,
        c4: colour.intercept,
        objects: points.iter().map(|p| p.object.clone()).collect(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{CatalogObject, ExtinctionCorrectedMeasurement, ExtinctionTerm, SkyPosition};
    use crate::extinction::CorrectedSeries;

    pub(crate) const C1: f64 = 0.05;
    pub(crate) const C2: f64 = -2.0;
    pub(crate) const C3: f64 = 1.1;
    pub(crate) const C4: f64 = -0.05;

    pub(crate) fn object(name: &str, mags: Option<(f64, f64)>) -> CatalogObject {
        CatalogObject {
            name: name.to_string(),
            position: SkyPosition::default(),
            is_standard: mags.is_some(),
            standard_mags: mags
                .map(|(b, v)| BTreeMap::from([("B".to_string(), b), ("V".to_string(), v)]))
                .unwrap_or_default(),
        }
    }

    pub(crate) fn sample(object: &str, filter: &str, time: f64, corrected: f64) -> ExtinctionCorrectedMeasurement {
        ExtinctionCorrectedMeasurement {
            object: object.to_string(),
            day: Day::from_time(time),
            time,
            filter: filter.to_string(),
            corrected,
            instrumental: corrected + 2.5,
            magnitude_error: Some(0.01),
            airmass: 1.3,
            term: ExtinctionTerm::Neutral,
        }
    }

    /// Corrected samples a standard with the given catalog magnitudes shows
    /// under the test coefficients.
    pub(crate) fn observed(std_b: f64, std_v: f64) -> (f64, f64) {
        let std_color = std_b - std_v;
        let obs_color = (std_color - C4) / C3;
        let obs_v = std_v - C1 * std_color - C2;
        (obs_v + obs_color, obs_v)
    }

    pub(crate) fn series(name: &str, standard: bool, samples: Vec<ExtinctionCorrectedMeasurement>) -> CorrectedSeries {
        CorrectedSeries {
            object: name.to_string(),
            is_standard: standard,
            measurements: samples,
        }
    }

    pub(crate) fn paired_standard(name: &str, std_b: f64, std_v: f64, times: &[f64]) -> CorrectedSeries {
        let (b, v) = observed(std_b, std_v);
        let mut samples = Vec::new();
        for &t in times {
            samples.push(sample(name, "B", t, b));
            samples.push(sample(name, "V", t + 0.001, v));
        }
        series(name, true, samples)
    }

    fn sequential() -> CalibrationOptions {
        CalibrationOptions {
            parallel: false,
            ..CalibrationOptions::default()
        }
    }

    #[test]
    fn two_standards_recover_coefficients() {
        let catalog = Catalog::new(vec![object("A", Some((10.0, 9.0))), object("S", Some((11.0, 10.2)))]).unwrap();
        let corrected = CorrectedSet::new(vec![
            paired_standard("A", 10.0, 9.0, &[5.60, 5.70, 5.80]),
            paired_standard("S", 11.0, 10.2, &[5.65, 5.75, 5.85]),
        ]);
        let mut diags = Diagnostics::new();
        let table = estimate_transformation(&catalog, &corrected, &sequential(), &mut diags);

        assert!(diags.is_empty(), "{:?}", diags.entries());
        let rec = table.get(Day(5)).unwrap();
        assert!((rec.c1 - C1).abs() < 1e-9, "c1 = {}", rec.c1);
        assert!((rec.c2 - C2).abs() < 1e-9);
        assert!((rec.c3 - C3).abs() < 1e-9);
        assert!((rec.c4 - C4).abs() < 1e-9);
        assert_eq!(rec.objects, vec!["A".to_string(), "S".to_string()]);
    }

    #[test]
    fn single_standard_night_has_no_record() {
        let catalog = Catalog::new(vec![object("A", Some((10.0, 9.0))), object("S", Some((11.0, 10.2)))]).unwrap();
        let corrected = CorrectedSet::new(vec![
            paired_standard("A", 10.0, 9.0, &[5.60, 5.70, 6.60]),
            paired_standard("S", 11.0, 10.2, &[5.65]),
        ]);
        let mut diags = Diagnostics::new();
        let table = estimate_transformation(&catalog, &corrected, &sequential(), &mut diags);

        assert!(table.get(Day(5)).is_some());
        assert!(table.get(Day(6)).is_none());
        let missing: Vec<_> = diags
            .iter()
            .filter(|d| d.stage == Stage::Transformation && d.day == Some(Day(6)))
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].kind, DiagnosticKind::MissingData);
    }

    #[test]
    fn unpaired_or_unreferenced_standards_do_not_qualify() {
        let catalog = Catalog::new(vec![
            object("A", Some((10.0, 9.0))),
            object("S", Some((11.0, 10.2))),
            CatalogObject {
                standard_mags: BTreeMap::from([("B".to_string(), 12.0)]),
                ..object("NoV", Some((0.0, 0.0)))
            },
        ])
        .unwrap();
        let mut s = paired_standard("S", 11.0, 10.2, &[5.65, 5.75, 5.85]);
        s.measurements.pop();
        let corrected = CorrectedSet::new(vec![
            paired_standard("A", 10.0, 9.0, &[5.60]),
            s,
            paired_standard("NoV", 12.0, 11.0, &[5.62]),
        ]);
        let mut diags = Diagnostics::new();
        let table = estimate_transformation(&catalog, &corrected, &sequential(), &mut diags);

        assert!(table.is_empty());
        assert_eq!(diags.for_object("S").count(), 1);
        assert_eq!(diags.for_object("NoV").count(), 1);
        assert_eq!(diags.count(Stage::Transformation, DiagnosticKind::MissingData), 3);
    }
}
