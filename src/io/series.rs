//! Read exported series back for plotting.
//!
//! Two sources give a light curve: the calibrated series (`<name>_cal.tsv`)
//! and the differential one derived from a target's field stars
//! (`<name>_all.tsv`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::aggregate::{FieldFrame, FieldStar};
use crate::error::AppError;
use crate::io::export::FIELD_SUFFIX;

const TIME_COL: usize = 0;
const FILTER_COL: usize = 2;
const MAGNITUDE_COL: usize = 3;

const FIELD_IMAGE_COL: usize = 3;
const FIELD_MAGNITUDE_COL: usize = 4;
const FIELD_ERROR_COL: usize = 5;
const FIELD_STARS_COL: usize = 6;

/// One point of a light curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub time: f64,
    pub filter: String,
    pub magnitude: f64,
    pub error: Option<f64>,
}

/// Whether a path names a field-star series.
pub fn is_field_series(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(FIELD_SUFFIX))
}

pub fn read_calibrated_series(path: &Path) -> Result<Vec<CurvePoint>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open series '{}': {e}", path.display())))?;
    let points = parse_calibrated_series(file)?;
    if points.is_empty() {
        return Err(AppError::no_data(format!(
            "Series '{}' contains no points.",
            path.display()
        )));
    }
    Ok(points)
}

pub fn parse_calibrated_series<R: Read>(source: R) -> Result<Vec<CurvePoint>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut points = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| AppError::input(format!("Failed to read series line {line}: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let number = |col: usize, name: &str| -> Result<f64, AppError> {
            record
                .get(col)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::input(format!("Series line {line}: invalid `{name}`.")))
        };
        let filter = record
            .get(FILTER_COL)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::input(format!("Series line {line}: missing `filter`.")))?;

        points.push(CurvePoint {
            time: number(TIME_COL, "time")?,
            filter: filter.to_string(),
            magnitude: number(MAGNITUDE_COL, "calibrated")?,
            error: None,
        });
    }
    Ok(points)
}

/// Differential light curve of a field-star series.
pub fn read_differential_series(path: &Path, undefined: &str) -> Result<Vec<CurvePoint>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open series '{}': {e}", path.display())))?;
    let object = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_end_matches(FIELD_SUFFIX))
        .unwrap_or_default();
    let frames = parse_field_series(file, object, undefined)?;

    let points = differential_curve(&frames);
    if points.is_empty() {
        return Err(AppError::no_data(format!(
            "Series '{}' has no frame with a defined target and field star.",
            path.display()
        )));
    }
    Ok(points)
}

/// Parse `<name>_all.tsv` rows back into field frames.
pub fn parse_field_series<R: Read>(source: R, object: &str, undefined: &str) -> Result<Vec<FieldFrame>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut frames = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| AppError::input(format!("Failed to read series line {line}: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let optional = |col: usize, name: &str| -> Result<Option<f64>, AppError> {
            match record.get(col) {
                Some(s) if s == undefined => Ok(None),
                Some(s) => s
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| AppError::input(format!("Series line {line}: invalid `{name}`."))),
                None => Err(AppError::input(format!("Series line {line}: missing `{name}`."))),
            }
        };
        let text = |col: usize, name: &str| -> Result<String, AppError> {
            record
                .get(col)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AppError::input(format!("Series line {line}: missing `{name}`.")))
        };

        let time = optional(TIME_COL, "time")?
            .ok_or_else(|| AppError::input(format!("Series line {line}: undefined `time`.")))?;

        let stars = record.len().saturating_sub(FIELD_STARS_COL);
        if stars % 3 != 0 {
            return Err(AppError::input(format!(
                "Series line {line}: field stars need source, magnitude and error."
            )));
        }
        let mut field_stars = Vec::with_capacity(stars / 3);
        for col in (FIELD_STARS_COL..record.len()).step_by(3) {
            let source_id = record
                .get(col)
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| AppError::input(format!("Series line {line}: invalid `source`.")))?;
            field_stars.push(FieldStar {
                source_id,
                magnitude: optional(col + 1, "magnitude")?,
                error: optional(col + 2, "error")?,
            });
        }

        frames.push(FieldFrame {
            object: object.to_string(),
            image: text(FIELD_IMAGE_COL, "image")?,
            time,
            filter: text(FILTER_COL, "filter")?,
            magnitude: optional(FIELD_MAGNITUDE_COL, "magnitude")?,
            error: optional(FIELD_ERROR_COL, "error")?,
            field_stars,
        });
    }
    Ok(frames)
}

/// One point per frame with a defined differential magnitude.
pub fn differential_curve(frames: &[FieldFrame]) -> Vec<CurvePoint> {
    frames
        .iter()
        .filter_map(|f| {
            let (magnitude, error) = f.differential()?;
            Some(CurvePoint {
                time: f.time,
                filter: f.filter.clone(),
                magnitude,
                error: Some(error),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exported_rows() {
        let text = "# time\tday\tfilter\tcalibrated\tcorrected\tinstrumental\n\
                    5.600000\t5\tB\t12.1000\t11.0\t13.5\n\
                    5.610000\t5\tV\t11.4000\t10.4\t12.9\n";
        let points = parse_calibrated_series(text.as_bytes()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].filter, "V");
        assert!((points[0].magnitude - 12.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_rows() {
        let err = parse_calibrated_series("5.6\t5\tB\tINDEF\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn differential_curve_skips_undefined_frames() {
        let text = "# time\tday\tfilter\timage\tmagnitude\terror\t...\n\
                    5.600000\t5\tV\tT-001\t12.0000\t0.0100\t1\t13.0000\t0.0200\t2\t15.0000\t0.0400\n\
                    5.700000\t5\tV\tT-002\tINDEF\tINDEF\t1\t13.0000\t0.0200\n\
                    5.800000\t5\tV\tT-003\t12.1000\t0.0100\t1\tINDEF\tINDEF\n\
                    5.900000\t5\tB\tT-004\t12.5000\t0.0100\t1\t13.0000\tINDEF\t2\t13.5000\t0.0300\n";
        let frames = parse_field_series(text.as_bytes(), "T", "INDEF").unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].field_stars.len(), 2);
        assert_eq!(frames[1].magnitude, None);

        let points = differential_curve(&frames);
        assert_eq!(points.len(), 2);
        assert!((points[0].magnitude - (12.0 - 14.0)).abs() < 1e-9);
        assert!((points[0].error.unwrap() - 0.04).abs() < 1e-9);
        assert_eq!(points[1].filter, "B");
        assert!((points[1].magnitude + 1.0).abs() < 1e-9);
        assert!((points[1].error.unwrap() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn field_rows_need_whole_star_triples() {
        let err = parse_field_series("5.6\t5\tV\tT-001\t12.0\t0.01\t1\t13.0\n".as_bytes(), "T", "INDEF")
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(is_field_series(Path::new("out/T_all.tsv")));
        assert!(!is_field_series(Path::new("out/T_cal.tsv")));
    }
}
