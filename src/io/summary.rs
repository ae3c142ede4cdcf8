//! Run summary JSON.
//!
//! A machine-readable record of one `photcal calibrate` run: inputs, counts,
//! every coefficient record and every diagnostic.

use std::fs::File;
use std::path::Path;

use chrono::Local;
use serde::Serialize;

use crate::app::pipeline::RunOutput;
use crate::domain::{
    CalibrationConfig, ColorFilters, Diagnostic, ExtinctionCoefficientRecord, GateScope,
    TransformationCoefficientRecord,
};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: String,
    pub inputs: SummaryInputs<'a>,
    pub counts: SummaryCounts,
    pub extinction: Vec<&'a ExtinctionCoefficientRecord>,
    pub transformation: Vec<&'a TransformationCoefficientRecord>,
    pub diagnostics: &'a [Diagnostic],
}

#[derive(Debug, Serialize)]
pub struct SummaryInputs<'a> {
    pub catalog: String,
    pub photometry: String,
    pub color: &'a ColorFilters,
    pub min_gate_samples: usize,
    pub gate_scope: GateScope,
}

#[derive(Debug, Serialize)]
pub struct SummaryCounts {
    pub catalog_objects: usize,
    pub files_read: usize,
    pub files_failed: usize,
    pub observed_objects: usize,
    pub instrumental: usize,
    pub corrected: usize,
    pub calibrated: usize,
    pub files_written: usize,
}

pub fn build_summary<'a>(output: &'a RunOutput, config: &'a CalibrationConfig) -> RunSummary<'a> {
    let run = &output.run;
    RunSummary {
        tool: "photcal",
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Local::now().to_rfc3339(),
        inputs: SummaryInputs {
            catalog: config.catalog_path.display().to_string(),
            photometry: config.photometry_dir.display().to_string(),
            color: &config.options.color,
            min_gate_samples: config.options.min_gate_samples,
            gate_scope: config.options.gate_scope,
        },
        counts: SummaryCounts {
            catalog_objects: output.catalog.len(),
            files_read: output.files_read,
            files_failed: output.files_failed,
            observed_objects: run.observations.len(),
            instrumental: run.observations.measurement_count(),
            corrected: run.corrected.measurement_count(),
            calibrated: run.calibrated.measurement_count(),
            files_written: output.export.files_written,
        },
        extinction: run.extinction.records().collect(),
        transformation: run.transformation.records().collect(),
        diagnostics: run.diagnostics.entries(),
    }
}

/// Write the summary as pretty JSON.
pub fn write_summary(path: &Path, output: &RunOutput, config: &CalibrationConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &build_summary(output, config))
        .map_err(|e| AppError::input(format!("Failed to write summary JSON: {e}")))?;
    tracing::info!("wrote run summary to {}", path.display());
    Ok(())
}
