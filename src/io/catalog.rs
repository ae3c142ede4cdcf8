//! Catalog loader.
//!
//! One object per tab-separated row:
//!
//! ```text
//! name  ra  dec  [YES|NO  [filter  mag]...]
//! ```
//!
//! - RA/Dec are decimal degrees or sexagesimal (`hh:mm:ss`, `±dd:mm:ss`).
//! - The standard flag defaults to `NO` when absent.
//! - Standard objects list `filter, magnitude` pairs; a magnitude equal to the
//!   undefined sentinel (or unparsable) leaves that filter undefined.
//!
//! A catalog that cannot be read is fatal: there is nothing to calibrate
//! against. Individual malformed rows are skipped with a diagnostic.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::{
    Catalog, CatalogObject, Diagnostic, DiagnosticKind, Diagnostics, SkyPosition, Stage,
};
use crate::error::AppError;

const NAME_COL: usize = 0;
const RA_COL: usize = 1;
const DEC_COL: usize = 2;
const STANDARD_COL: usize = 3;
const FIRST_MAG_COL: usize = 4;

/// Load the catalog from a file.
pub fn load_catalog(path: &Path, undefined: &str, diags: &mut Diagnostics) -> Result<Catalog, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open catalog '{}': {e}", path.display()))
    })?;
    let catalog = parse_catalog(file, undefined, diags)?;
    tracing::info!(
        objects = catalog.len(),
        standards = catalog.standards().count(),
        "loaded catalog from {}",
        path.display()
    );
    Ok(catalog)
}

/// Parse catalog rows from any reader.
pub fn parse_catalog<R: Read>(source: R, undefined: &str, diags: &mut Diagnostics) -> Result<Catalog, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut objects = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result
            .map_err(|e| AppError::input(format!("Failed to read catalog line {line}: {e}")))?;

        if record.iter().all(str::is_empty) {
            continue;
        }
        match parse_object(&record, undefined) {
            Ok(obj) => objects.push(obj),
            Err(message) => diags.push(Diagnostic::new(
                Stage::Ingest,
                DiagnosticKind::MissingData,
                format!("catalog line {line} skipped: {message}"),
            )),
        }
    }

    if objects.is_empty() {
        return Err(AppError::no_data("Catalog contains no usable objects."));
    }
    Catalog::new(objects)
}

fn parse_object(record: &csv::StringRecord, undefined: &str) -> Result<CatalogObject, String> {
    let field = |i: usize| record.get(i).filter(|s| !s.is_empty());

    let name = field(NAME_COL).ok_or("missing object name")?.to_string();
    let ra = field(RA_COL).ok_or("missing right ascension")?;
    let dec = field(DEC_COL).ok_or("missing declination")?;
    let position = SkyPosition {
        ra_deg: parse_angle(ra, true).ok_or_else(|| format!("invalid right ascension `{ra}`"))?,
        dec_deg: parse_angle(dec, false).ok_or_else(|| format!("invalid declination `{dec}`"))?,
    };

    let is_standard = match field(STANDARD_COL) {
        None => false,
        Some(flag) => parse_standard_flag(flag).ok_or_else(|| format!("invalid standard flag `{flag}`"))?,
    };

    let mut standard_mags = BTreeMap::new();
    if is_standard {
        let mut col = FIRST_MAG_COL;
        while let (Some(filter), Some(mag)) = (field(col), record.get(col + 1)) {
            if let Some(value) = parse_value(mag, undefined) {
                standard_mags.insert(filter.to_string(), value);
            }
            col += 2;
        }
    }

    Ok(CatalogObject {
        name,
        position,
        is_standard,
        standard_mags,
    })
}

fn parse_standard_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "std" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a numeric field; the sentinel, blanks and non-finite values are "no value".
pub fn parse_value(s: &str, undefined: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case(undefined) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decimal degrees, or sexagesimal with `:` separators (RA in hours).
fn parse_angle(s: &str, is_ra: bool) -> Option<f64> {
    if !s.contains(':') {
        return s.parse::<f64>().ok().filter(|v| v.is_finite());
    }

    let negative = s.starts_with('-');
    let mut parts = s.trim_start_matches(['-', '+']).split(':');
    let whole: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next().map_or(Some(0.0), |p| p.parse().ok())?;
    let seconds: f64 = parts.next().map_or(Some(0.0), |p| p.parse().ok())?;
    if parts.next().is_some() || !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let mut value = whole + minutes / 60.0 + seconds / 3600.0;
    if is_ra {
        value *= 15.0;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# name\tra\tdec\tstd\tfilter\tmag
SA98-670\t13:19:45\t-00:27:22\tYES\tB\t13.12\tV\t11.93\tR\tINDEF
GD71\t88.115\t15.887\tyes\tB\t12.78\tV\t13.03
V1500Cyg\t20:11:36\t+48:09:02\tNO\t1\t20:11:40\t48:10:00

broken\t12:00:00
";

    #[test]
    fn parses_standard_and_target_rows() {
        let mut diags = Diagnostics::new();
        let catalog = parse_catalog(SAMPLE.as_bytes(), "INDEF", &mut diags).unwrap();

        assert_eq!(catalog.len(), 3);
        let sa = catalog.get("SA98-670").unwrap();
        assert!(sa.is_standard);
        assert_eq!(sa.standard_mag("B"), Some(13.12));
        assert_eq!(sa.standard_mag("V"), Some(11.93));
        assert_eq!(sa.standard_mag("R"), None);
        assert!((sa.position.ra_deg - (13.0 + 19.0 / 60.0 + 45.0 / 3600.0) * 15.0).abs() < 1e-9);
        assert!(sa.position.dec_deg < 0.0);

        let target = catalog.get("V1500Cyg").unwrap();
        assert!(!target.is_standard);
        assert!(target.standard_mags.is_empty());

        assert_eq!(diags.count(Stage::Ingest, DiagnosticKind::MissingData), 1);
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let mut diags = Diagnostics::new();
        let err = parse_catalog("# nothing\n".as_bytes(), "INDEF", &mut diags).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn duplicate_names_are_fatal() {
        let mut diags = Diagnostics::new();
        let text = "A\t1.0\t2.0\nA\t3.0\t4.0\n";
        assert_eq!(parse_catalog(text.as_bytes(), "INDEF", &mut diags).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn magnitude_sentinel_is_not_zero() {
        assert_eq!(parse_value("INDEF", "INDEF"), None);
        assert_eq!(parse_value("indef", "INDEF"), None);
        assert_eq!(parse_value("0", "INDEF"), Some(0.0));
        assert_eq!(parse_value("nan", "INDEF"), None);
    }
}
