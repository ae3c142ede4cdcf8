use std::collections::BTreeMap;
use std::path::PathBuf;

use photcal::aggregate::ObservationSet;
use photcal::app::pipeline::{calibrate, run_calibration};
use photcal::data::{generate_night, SimulationConfig};
use photcal::domain::{
    CalibrationConfig, CalibrationOptions, Catalog, CatalogObject, Day, DiagnosticKind, Diagnostics,
    InstrumentalMeasurement, SkyPosition, Stage, DEFAULT_UNDEFINED_SENTINEL,
};
use photcal::io::{read_calibrated_series, read_differential_series};

const K_B: f64 = 0.30;
const ZP_B: f64 = 1.00;
const K_V: f64 = 0.20;
const ZP_V: f64 = 0.80;
const TRANSFORM: (f64, f64, f64, f64) = (0.05, -0.10, 1.10, -0.05);
const AIRMASSES: [f64; 3] = [1.1, 1.5, 1.9];

fn catalog_object(name: &str, mags: Option<(f64, f64)>) -> CatalogObject {
    let standard_mags: BTreeMap<String, f64> = mags
        .map(|(b, v)| [("B".to_string(), b), ("V".to_string(), v)].into_iter().collect())
        .unwrap_or_default();
    CatalogObject {
        name: name.to_string(),
        position: SkyPosition::default(),
        is_standard: mags.is_some(),
        standard_mags,
    }
}

/// Instrumental magnitudes of an object with true standard magnitudes `(b, v)`
/// on night 5, one B/V pair per airmass.
fn night_five(name: &str, b: f64, v: f64) -> Vec<InstrumentalMeasurement> {
    let (c1, c2, c3, c4) = TRANSFORM;
    let std_color = b - v;
    let obs_visual = v - c1 * std_color - c2;
    let obs_blue = obs_visual + (std_color - c4) / c3;

    let mut out = Vec::new();
    for (i, &x) in AIRMASSES.iter().enumerate() {
        let time = 5.6 + 0.1 * i as f64;
        for (filter, mag, offset) in [("B", obs_blue + ZP_B + K_B * x, 0.0), ("V", obs_visual + ZP_V + K_V * x, 0.002)] {
            out.push(InstrumentalMeasurement {
                object: name.to_string(),
                image: format!("{name}-{:03}", i + 1),
                day: Day::from_time(time + offset),
                time: time + offset,
                filter: filter.to_string(),
                magnitude: Some(mag),
                magnitude_error: Some(0.01),
                airmass: x,
            });
        }
    }
    out
}

fn scenario_catalog() -> Catalog {
    Catalog::new(vec![
        catalog_object("A", Some((10.0, 9.0))),
        catalog_object("S", Some((11.0, 10.2))),
        catalog_object("T", None),
    ])
    .unwrap()
}

#[test]
fn standards_calibrate_a_target_that_joins_no_fit() {
    let catalog = scenario_catalog();
    let mut diags = Diagnostics::new();
    let measurements = night_five("A", 10.0, 9.0)
        .into_iter()
        .chain(night_five("S", 11.0, 10.2))
        .chain(night_five("T", 12.5, 11.8));
    let observations = ObservationSet::from_measurements(&catalog, measurements, &mut diags);

    let run = calibrate(&catalog, observations, &CalibrationOptions::default(), diags).unwrap();

    let day = Day(5);
    let b = run.extinction.get(day, "B").expect("B extinction on night 5");
    let v = run.extinction.get(day, "V").expect("V extinction on night 5");
    assert!((b.slope - K_B).abs() < 1e-9);
    assert!((v.slope - K_V).abs() < 1e-9);
    assert_eq!(b.objects, vec!["A".to_string(), "S".to_string()]);
    assert_eq!(b.n_samples, 6);

    let t = run.transformation.get(day).expect("transformation on night 5");
    assert!((t.c1 - TRANSFORM.0).abs() < 1e-9);
    assert!((t.c3 - TRANSFORM.2).abs() < 1e-9);
    assert_eq!(t.objects, vec!["A".to_string(), "S".to_string()]);

    let target = run.calibrated.get("T").expect("target calibrated");
    assert_eq!(target.measurements.len(), 6);
    for m in &target.measurements {
        let expected = if m.filter == "B" { 12.5 } else { 11.8 };
        assert!((m.calibrated - expected).abs() < 1e-9, "{} {}", m.filter, m.calibrated);
        assert_eq!(m.day, day);
    }
    // Blue block first, then visual.
    assert!(target.measurements[..3].iter().all(|m| m.filter == "B"));
    assert!(target.measurements[3..].iter().all(|m| m.filter == "V"));

    assert_eq!(run.diagnostics.count(Stage::Calibration, DiagnosticKind::MissingData), 0);
}

#[test]
fn unpaired_target_is_skipped_with_a_diagnostic() {
    let catalog = scenario_catalog();
    let mut diags = Diagnostics::new();
    let mut target = night_five("T", 12.5, 11.8);
    target.pop();
    let measurements = night_five("A", 10.0, 9.0)
        .into_iter()
        .chain(night_five("S", 11.0, 10.2))
        .chain(target);
    let observations = ObservationSet::from_measurements(&catalog, measurements, &mut diags);

    let run = calibrate(&catalog, observations, &CalibrationOptions::default(), diags).unwrap();

    assert!(run.transformation.get(Day(5)).is_some());
    assert!(run.calibrated.get("T").is_none());
    assert!(run.calibrated.get("A").is_some());
    let skipped: Vec<_> = run
        .diagnostics
        .for_object("T")
        .filter(|d| d.stage == Stage::Calibration && d.kind == DiagnosticKind::MissingData)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].day, Some(Day(5)));
    // The corrected series still carries the unpaired samples.
    assert_eq!(run.corrected.get("T").unwrap().measurements.len(), 5);
}

#[test]
fn simulated_night_is_recovered_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let sim = SimulationConfig {
        output_dir: dir.path().join("night"),
        noise: 0.0,
        variability: 0.0,
        ..SimulationConfig::default()
    };
    let night = generate_night(&sim).unwrap();

    let config = CalibrationConfig {
        catalog_path: night.catalog_path.clone(),
        photometry_dir: night.photometry_dir.clone(),
        identity_path: None,
        output_dir: dir.path().join("out"),
        summary_path: Some(dir.path().join("summary.json")),
        undefined_sentinel: DEFAULT_UNDEFINED_SENTINEL.to_string(),
        options: CalibrationOptions::default(),
    };
    let output = run_calibration(&config).unwrap();

    let day = Day(night.mjd);
    assert!(output.run.extinction.get(day, "B").is_some());
    assert!(output.run.transformation.get(day).is_some());
    assert_eq!(output.files_failed, 0);

    for obj in night.objects.iter().filter(|o| !o.is_standard) {
        let path: PathBuf = config.output_dir.join(format!("{}_cal.tsv", obj.name));
        let points = read_calibrated_series(&path).unwrap();
        assert_eq!(points.len(), 2 * sim.rounds);
        for p in points {
            let expected = if p.filter == "B" { obj.blue } else { obj.visual };
            assert!((p.magnitude - expected).abs() < 0.01, "{} {} {}", obj.name, p.filter, p.magnitude);
        }

        let field = config.output_dir.join(format!("{}_all.tsv", obj.name));
        let differential = read_differential_series(&field, DEFAULT_UNDEFINED_SENTINEL).unwrap();
        assert_eq!(differential.len(), 2 * sim.rounds);
        assert!(differential.iter().all(|p| p.error.is_some()));
    }
    for obj in night.objects.iter().filter(|o| o.is_standard) {
        assert!(!config.output_dir.join(format!("{}_all.tsv", obj.name)).exists());
    }

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["tool"], "photcal");
    assert_eq!(summary["counts"]["catalog_objects"], 6);
}

#[test]
fn photometry_without_catalog_matches_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.tsv");
    std::fs::write(&catalog_path, "A\t01:00:00\t+10:00:00\tYES\tB\t10.0\tV\t9.0\n").unwrap();
    let photometry = dir.path().join("phot").join("B");
    std::fs::create_dir_all(&photometry).unwrap();
    std::fs::write(photometry.join("ZZ-001.csv"), "0,1,1,60000.7,12.0,1.2,0.01\n").unwrap();

    let config = CalibrationConfig {
        catalog_path,
        photometry_dir: dir.path().join("phot"),
        identity_path: None,
        output_dir: dir.path().join("out"),
        summary_path: None,
        undefined_sentinel: DEFAULT_UNDEFINED_SENTINEL.to_string(),
        options: CalibrationOptions::default(),
    };
    let err = run_calibration(&config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn hyphenated_object_image_without_sequence_is_attributed() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.tsv");
    std::fs::write(&catalog_path, "SA98-670\t06:52:00\t-00:20:00\tYES\tB\t12.0\tV\t11.2\n").unwrap();
    let photometry = dir.path().join("phot").join("V");
    std::fs::create_dir_all(&photometry).unwrap();
    std::fs::write(photometry.join("SA98-670.csv"), "0,1,1,60000.7,12.0,1.2,0.01\n").unwrap();

    let config = CalibrationConfig {
        catalog_path,
        photometry_dir: dir.path().join("phot"),
        identity_path: None,
        output_dir: dir.path().join("out"),
        summary_path: None,
        undefined_sentinel: DEFAULT_UNDEFINED_SENTINEL.to_string(),
        options: CalibrationOptions::default(),
    };
    let output = run_calibration(&config).unwrap();

    assert_eq!(output.run.observations.unresolved_rows, 0);
    let series = output.run.observations.get("SA98-670").expect("attributed");
    assert_eq!(series.measurements.len(), 1);
    assert_eq!(series.measurements[0].image, "SA98-670");
}
