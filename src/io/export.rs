//! Per-object result files.
//!
//! For every object the output directory receives up to three tab-separated
//! files, each starting with a `#` header row:
//!
//! - `<name>_inst.tsv`: instrumental series (undefined magnitudes written as
//!   the sentinel)
//! - `<name>_ext.tsv`: extinction-corrected series
//! - `<name>_cal.tsv`: calibrated series
//! - `<name>_all.tsv`: a target's instrumental magnitude per image followed by
//!   `source, magnitude, error` for every field star of that image
//!
//! An empty collection writes no file. A failure to write one object's files
//! is recorded as a diagnostic and the other objects are still written. Two
//! objects whose names map to the same file name never overwrite each other:
//! the later one is skipped with a diagnostic.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::FieldFrame;
use crate::app::pipeline::CalibrationRun;
use crate::domain::{
    CalibratedMeasurement, Day, Diagnostic, DiagnosticKind, Diagnostics, ExtinctionCorrectedMeasurement,
    InstrumentalMeasurement, Stage,
};
use crate::error::AppError;

pub const INSTRUMENTAL_SUFFIX: &str = "_inst.tsv";
pub const CORRECTED_SUFFIX: &str = "_ext.tsv";
pub const CALIBRATED_SUFFIX: &str = "_cal.tsv";
pub const FIELD_SUFFIX: &str = "_all.tsv";

const INSTRUMENTAL_HEADER: &str = "# time\tday\tfilter\timage\tmagnitude\terror\tairmass";
const CORRECTED_HEADER: &str = "# time\tday\tfilter\tcorrected\tinstrumental\terror\tairmass\tslope\tintercept";
pub const CALIBRATED_HEADER: &str = "# time\tday\tfilter\tcalibrated\tcorrected\tinstrumental";
pub const FIELD_HEADER: &str = "# time\tday\tfilter\timage\tmagnitude\terror\t[source\tmagnitude\terror]...";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub files_written: usize,
    pub objects_failed: usize,
}

/// Everything written for one object.
struct ObjectFiles<'a> {
    instrumental: &'a [InstrumentalMeasurement],
    corrected: &'a [ExtinctionCorrectedMeasurement],
    calibrated: &'a [CalibratedMeasurement],
    field_frames: &'a [FieldFrame],
}

/// Write the result series of every object under `dir`.
///
/// Only failing to create `dir` itself is fatal.
pub fn write_object_outputs(
    dir: &Path,
    run: &CalibrationRun,
    undefined: &str,
    diags: &mut Diagnostics,
) -> Result<ExportStats, AppError> {
    fs::create_dir_all(dir).map_err(|e| {
        AppError::input(format!("Failed to create output directory '{}': {e}", dir.display()))
    })?;

    let mut stats = ExportStats::default();
    let mut stems: HashMap<String, &str> = HashMap::new();
    for series in run.observations.iter() {
        let object = series.object.as_str();

        let stem = file_stem(object);
        if let Some(owner) = stems.get(&stem) {
            stats.objects_failed += 1;
            diags.push(
                Diagnostic::new(
                    Stage::Export,
                    DiagnosticKind::Io,
                    format!("output name `{stem}` already used by {owner}; files not written"),
                )
                .object(object),
            );
            continue;
        }
        stems.insert(stem.clone(), object);

        let corrected = run
            .corrected
            .get(object)
            .map(|s| s.measurements.as_slice())
            .unwrap_or_default();
        let calibrated = run
            .calibrated
            .get(object)
            .map(|s| s.measurements.as_slice())
            .unwrap_or_default();

        let files = ObjectFiles {
            instrumental: &series.measurements,
            corrected,
            calibrated,
            field_frames: run.observations.field_frames(object),
        };
        match write_object(dir, &stem, &files, undefined) {
            Ok(written) => stats.files_written += written,
            Err(message) => {
                stats.objects_failed += 1;
                diags.push(Diagnostic::new(Stage::Export, DiagnosticKind::Io, message).object(object));
            }
        }
    }

    tracing::info!(
        files = stats.files_written,
        failed = stats.objects_failed,
        "wrote per-object results to {}",
        dir.display()
    );
    Ok(stats)
}

fn write_object(dir: &Path, stem: &str, files: &ObjectFiles<'_>, undefined: &str) -> Result<usize, String> {
    let path = |suffix: &str| dir.join(format!("{stem}{suffix}"));
    let mut written = 0;

    if !files.instrumental.is_empty() {
        write_rows(&path(INSTRUMENTAL_SUFFIX), INSTRUMENTAL_HEADER, files.instrumental, |m| {
            format!(
                "{:.6}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
                m.time,
                m.day,
                m.filter,
                m.image,
                fmt_optional(m.magnitude, undefined),
                fmt_optional(m.magnitude_error, undefined),
                m.airmass,
            )
        })?;
        written += 1;
    }

    if !files.corrected.is_empty() {
        write_rows(&path(CORRECTED_SUFFIX), CORRECTED_HEADER, files.corrected, |m| {
            format!(
                "{:.6}\t{}\t{}\t{:.4}\t{:.4}\t{}\t{:.4}\t{:.6}\t{:.6}",
                m.time,
                m.day,
                m.filter,
                m.corrected,
                m.instrumental,
                fmt_optional(m.magnitude_error, undefined),
                m.airmass,
                m.term.slope(),
                m.term.intercept(),
            )
        })?;
        written += 1;
    }

    if !files.calibrated.is_empty() {
        write_rows(&path(CALIBRATED_SUFFIX), CALIBRATED_HEADER, files.calibrated, |m| {
            format!(
                "{:.6}\t{}\t{}\t{:.4}\t{:.4}\t{:.4}",
                m.time, m.day, m.filter, m.calibrated, m.corrected, m.instrumental,
            )
        })?;
        written += 1;
    }

    if !files.field_frames.is_empty() {
        write_rows(&path(FIELD_SUFFIX), FIELD_HEADER, files.field_frames, |f| {
            let mut line = format!(
                "{:.6}\t{}\t{}\t{}\t{}\t{}",
                f.time,
                Day::from_time(f.time),
                f.filter,
                f.image,
                fmt_optional(f.magnitude, undefined),
                fmt_optional(f.error, undefined),
            );
            for star in &f.field_stars {
                let _ = write!(
                    line,
                    "\t{}\t{}\t{}",
                    star.source_id,
                    fmt_optional(star.magnitude, undefined),
                    fmt_optional(star.error, undefined),
                );
            }
            line
        })?;
        written += 1;
    }

    Ok(written)
}

fn write_rows<T>(path: &Path, header: &str, rows: &[T], line: impl Fn(&T) -> String) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("failed to create '{}': {e}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{header}").map_err(|e| format!("failed to write '{}': {e}", path.display()))?;
    for row in rows {
        writeln!(out, "{}", line(row)).map_err(|e| format!("failed to write '{}': {e}", path.display()))?;
    }
    out.flush()
        .map_err(|e| format!("failed to write '{}': {e}", path.display()))
}

fn fmt_optional(value: Option<f64>, undefined: &str) -> String {
    value.map_or_else(|| undefined.to_string(), |v| format!("{v:.4}"))
}

/// File-name stem for an object; path separators and whitespace become `_`.
fn file_stem(object: &str) -> String {
    object
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Result file path for an object.
pub fn output_path(dir: &Path, object: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{suffix}", file_stem(object)))
}
