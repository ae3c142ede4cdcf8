//! The calibration workflow shared by `photcal calibrate` and the tests.
//!
//! load catalog -> identities -> photometry -> aggregate -> extinction
//! estimate -> correct -> transformation estimate -> apply -> export
//!
//! [`calibrate`] is the in-memory core (no files); [`run_calibration`] wraps it
//! with the file-based inputs and outputs.

use crate::aggregate::{aggregate_rows, ObservationSet};
use crate::domain::{CalibrationConfig, CalibrationOptions, Catalog, Diagnostics};
use crate::error::AppError;
use crate::extinction::{correct_measurements, estimate_extinction, CorrectedSet, ExtinctionTable};
use crate::io::{load_catalog, scan_photometry, write_object_outputs, write_summary, ExportStats, IdentityMap};
use crate::transform::{apply_transformation, estimate_transformation, CalibratedSet, TransformationTable};

/// Everything one pass of the calibration core derived.
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub observations: ObservationSet,
    pub extinction: ExtinctionTable,
    pub corrected: CorrectedSet,
    pub transformation: TransformationTable,
    pub calibrated: CalibratedSet,
    pub diagnostics: Diagnostics,
}

/// All outputs of a `photcal calibrate` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub catalog: Catalog,
    pub files_read: usize,
    pub files_failed: usize,
    pub run: CalibrationRun,
    pub export: ExportStats,
}

/// Run the four calibration stages over aggregated observations.
///
/// Each stage fully consumes the previous one. Diagnostics raised before this
/// point (ingest, aggregation) are passed in and carried through.
pub fn calibrate(
    catalog: &Catalog,
    observations: ObservationSet,
    options: &CalibrationOptions,
    mut diagnostics: Diagnostics,
) -> Result<CalibrationRun, AppError> {
    options.validate()?;

    let extinction = estimate_extinction(catalog, &observations, options, &mut diagnostics);
    let corrected = correct_measurements(&observations, &extinction, &mut diagnostics);
    let transformation = estimate_transformation(catalog, &corrected, options, &mut diagnostics);
    let calibrated = apply_transformation(&corrected, &transformation, &options.color, &mut diagnostics);

    Ok(CalibrationRun {
        observations,
        extinction,
        corrected,
        transformation,
        calibrated,
        diagnostics,
    })
}

/// Execute the full file-based pipeline.
pub fn run_calibration(config: &CalibrationConfig) -> Result<RunOutput, AppError> {
    config.options.validate()?;
    let mut diagnostics = Diagnostics::new();

    // 1) Catalog and identities.
    let catalog = load_catalog(&config.catalog_path, &config.undefined_sentinel, &mut diagnostics)?;
    let mut identity = IdentityMap::from_catalog(&catalog);
    if let Some(path) = &config.identity_path {
        identity.extend_from_file(path, &catalog, &mut diagnostics)?;
    }

    // 2) Photometry.
    let scan = scan_photometry(&config.photometry_dir, &config.undefined_sentinel, &mut diagnostics)?;
    let (files_read, files_failed) = (scan.files_read, scan.files_failed);
    let observations = aggregate_rows(&catalog, &identity, scan.rows, &mut diagnostics);
    if observations.is_empty() {
        return Err(AppError::no_data(format!(
            "No photometry under '{}' could be attributed to a catalog object.",
            config.photometry_dir.display()
        )));
    }

    // 3) Calibration core.
    let mut run = calibrate(&catalog, observations, &config.options, diagnostics)?;

    // 4) Outputs.
    let mut diagnostics = std::mem::take(&mut run.diagnostics);
    let export = write_object_outputs(
        &config.output_dir,
        &run,
        &config.undefined_sentinel,
        &mut diagnostics,
    )?;
    run.diagnostics = diagnostics;

    let output = RunOutput {
        catalog,
        files_read,
        files_failed,
        run,
        export,
    };
    if let Some(path) = &config.summary_path {
        write_summary(path, &output, config)?;
    }

    Ok(output)
}
