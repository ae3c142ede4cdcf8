//! Per-image photometry reader.
//!
//! Layout under the photometry root:
//!
//! ```text
//! <root>/.../<filter>/<field>-<seq>.csv   (comma separated)
//! <root>/.../<filter>/<field>-<seq>.tsv   (tab separated)
//! ```
//!
//! Each file is one image. The field an image belongs to is decided later,
//! against the identity map (see [`crate::io::IdentityMap::field_of`]).
//! Rows are detected sources:
//!
//! ```text
//! source_id, x, y, time, magnitude, airmass, magnitude_error
//! ```
//!
//! The undefined sentinel in the magnitude column means "no value" and is kept
//! as such; rows without a usable time or airmass cannot be placed on a night
//! and are dropped. A file that cannot be read only loses that file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::domain::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::error::AppError;
use crate::io::catalog::parse_value;

/// Directory recursion limit when looking for image files.
const MAX_SEARCH_DEPTH: usize = 8;

const ID_COL: usize = 0;
const TIME_COL: usize = 3;
const MAG_COL: usize = 4;
const AIRMASS_COL: usize = 5;
const ERROR_COL: usize = 6;

/// One detected source in one image, before identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometryRow {
    /// Image file stem, e.g. `SA98-670-003`.
    pub image: String,
    pub filter: String,
    pub source_id: u32,
    pub time: f64,
    pub magnitude: Option<f64>,
    pub magnitude_error: Option<f64>,
    pub airmass: f64,
}

/// Everything read from the photometry tree.
#[derive(Debug, Clone, Default)]
pub struct PhotometryScan {
    pub rows: Vec<PhotometryRow>,
    pub files_read: usize,
    pub files_failed: usize,
    pub rows_skipped: usize,
}

/// Read every image file under `root`.
pub fn scan_photometry(root: &Path, undefined: &str, diags: &mut Diagnostics) -> Result<PhotometryScan, AppError> {
    if !root.is_dir() {
        return Err(AppError::input(format!(
            "Photometry directory not found: {}",
            root.display()
        )));
    }

    let files = discover_image_files(root);
    tracing::info!(files = files.len(), "found photometry files under {}", root.display());

    let mut scan = PhotometryScan::default();
    for path in files {
        let Some(image) = ImageKey::from_path(&path) else {
            diags.push(Diagnostic::new(
                Stage::Ingest,
                DiagnosticKind::MissingData,
                format!("cannot derive filter/image from '{}'", path.display()),
            ));
            scan.files_failed += 1;
            continue;
        };

        match read_image_file(&path, &image, undefined, diags) {
            Ok((rows, skipped)) => {
                tracing::debug!(rows = rows.len(), skipped, "read {}", path.display());
                scan.rows.extend(rows);
                scan.rows_skipped += skipped;
                scan.files_read += 1;
            }
            Err(message) => {
                diags.push(
                    Diagnostic::new(Stage::Ingest, DiagnosticKind::Io, message).filter(image.filter.clone()),
                );
                scan.files_failed += 1;
            }
        }
    }

    if scan.rows.is_empty() {
        tracing::warn!("no photometry rows found under {}", root.display());
    }
    Ok(scan)
}

/// Filter and image name derived from a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageKey {
    pub filter: String,
    pub image: String,
    pub delimiter: u8,
}

impl ImageKey {
    pub fn from_path(path: &Path) -> Option<Self> {
        let delimiter = match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => b',',
            "tsv" => b'\t',
            _ => return None,
        };
        let image = path.file_stem()?.to_str()?.to_string();
        let filter = path.parent()?.file_name()?.to_str()?.to_string();
        if image.is_empty() || filter.is_empty() {
            return None;
        }
        Some(Self {
            filter,
            image,
            delimiter,
        })
    }
}

/// Strip a trailing `-<digits>` sequence number: `SA98-670-003` → `SA98-670`.
///
/// A stem without a sequence number whose name ends in digits (`SA98-670`)
/// is ambiguous here; [`crate::io::IdentityMap::field_of`] settles it.
pub fn field_from_image_name(image: &str) -> &str {
    match image.rsplit_once('-') {
        Some((field, seq)) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()) => field,
        _ => image,
    }
}

fn read_image_file(
    path: &Path,
    key: &ImageKey,
    undefined: &str,
    diags: &mut Diagnostics,
) -> Result<(Vec<PhotometryRow>, usize), String> {
    let file = File::open(path).map_err(|e| format!("failed to open '{}': {e}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(key.delimiter)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| format!("failed to parse '{}' line {line}: {e}", path.display()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        match parse_row(&record, key, undefined) {
            Ok(row) => rows.push(row),
            Err(message) => {
                skipped += 1;
                diags.push(
                    Diagnostic::new(
                        Stage::Ingest,
                        DiagnosticKind::InvalidSample,
                        format!("{} line {line}: {message}", key.image),
                    )
                    .filter(key.filter.clone()),
                );
            }
        }
    }

    Ok((rows, skipped))
}

fn parse_row(record: &csv::StringRecord, key: &ImageKey, undefined: &str) -> Result<PhotometryRow, String> {
    let get = |i: usize, name: &str| {
        record
            .get(i)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing `{name}` column"))
    };

    let id = get(ID_COL, "source_id")?;
    let source_id = id
        .parse::<u32>()
        .map_err(|_| format!("invalid source id `{id}`"))?;

    let time_raw = get(TIME_COL, "time")?;
    let time = parse_value(time_raw, undefined).ok_or_else(|| format!("undefined time `{time_raw}`"))?;

    let airmass_raw = get(AIRMASS_COL, "airmass")?;
    let airmass =
        parse_value(airmass_raw, undefined).ok_or_else(|| format!("undefined airmass `{airmass_raw}`"))?;
    if airmass < 1.0 {
        return Err(format!("airmass {airmass} is below 1"));
    }

    let magnitude = parse_value(get(MAG_COL, "magnitude")?, undefined);
    let magnitude_error = record
        .get(ERROR_COL)
        .and_then(|s| parse_value(s, undefined));

    Ok(PhotometryRow {
        image: key.image.clone(),
        filter: key.filter.clone(),
        source_id,
        time,
        magnitude,
        magnitude_error,
        airmass,
    })
}

/// Discover image files under `root` (deterministic order).
pub fn discover_image_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    discover_inner(root, 0, &mut out);
    out.sort();
    out
}

fn discover_inner(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let hidden = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with('.'));
        if hidden {
            continue;
        }

        if file_type.is_dir() {
            discover_inner(&path, depth + 1, out);
        } else if file_type.is_file() && ImageKey::from_path(&path).is_some() {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ImageKey {
        ImageKey {
            filter: "V".to_string(),
            image: "T1-001".to_string(),
            delimiter: b',',
        }
    }

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn image_key_from_path() {
        let key = ImageKey::from_path(Path::new("night/V/SA98-670-003.csv")).unwrap();
        assert_eq!(key.filter, "V");
        assert_eq!(key.image, "SA98-670-003");
        assert_eq!(key.delimiter, b',');

        let key = ImageKey::from_path(Path::new("B/GD71.tsv")).unwrap();
        assert_eq!(key.image, "GD71");
        assert_eq!(key.delimiter, b'\t');

        assert!(ImageKey::from_path(Path::new("B/GD71.fit")).is_none());
    }

    #[test]
    fn parses_row_with_undefined_magnitude() {
        let row = parse_row(
            &record(&["0", "512.3", "498.1", "60380.125", "INDEF", "1.42", "INDEF"]),
            &key(),
            "INDEF",
        )
        .unwrap();
        assert_eq!(row.source_id, 0);
        assert_eq!(row.magnitude, None);
        assert_eq!(row.magnitude_error, None);
        assert!((row.airmass - 1.42).abs() < 1e-12);
        assert_eq!(row.image, "T1-001");
    }

    #[test]
    fn rejects_rows_that_cannot_be_placed() {
        let k = key();
        assert!(parse_row(&record(&["0", "1", "2", "INDEF", "12.1", "1.2", "0.01"]), &k, "INDEF").is_err());
        assert!(parse_row(&record(&["0", "1", "2", "60380.1", "12.1", "0.8", "0.01"]), &k, "INDEF").is_err());
        assert!(parse_row(&record(&["a", "1", "2", "60380.1", "12.1", "1.2", "0.01"]), &k, "INDEF").is_err());
        assert!(parse_row(&record(&["0", "1", "2", "60380.1"]), &k, "INDEF").is_err());
    }

    #[test]
    fn sequence_suffix_is_stripped_only_when_numeric() {
        assert_eq!(field_from_image_name("SA98-670-003"), "SA98-670");
        assert_eq!(field_from_image_name("GD71"), "GD71");
        assert_eq!(field_from_image_name("RU-149a"), "RU-149a");
    }

    #[test]
    fn unreadable_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let v = dir.path().join("V");
        fs::create_dir_all(&v).unwrap();
        fs::write(v.join("T1-001.csv"), "0,1,1,60380.7,12.5,1.3,0.01\n1,5,5,60380.7,14.0,1.3,0.02\n").unwrap();
        fs::write(v.join("T1-002.csv"), [0x30, 0x2c, 0xff, 0xfe, 0x2c, 0x31, 0x0a]).unwrap();
        fs::write(v.join("notes.txt"), "ignored").unwrap();

        let mut diags = Diagnostics::new();
        let scan = scan_photometry(dir.path(), "INDEF", &mut diags).unwrap();

        assert_eq!(scan.files_read, 1);
        assert_eq!(scan.files_failed, 1);
        assert_eq!(scan.rows.len(), 2);
        assert!(scan.rows.iter().all(|r| r.image == "T1-001"));

        let io: Vec<_> = diags
            .iter()
            .filter(|d| d.stage == Stage::Ingest && d.kind == DiagnosticKind::Io)
            .collect();
        assert_eq!(io.len(), 1);
        assert!(io[0].message.contains("T1-002"), "{}", io[0].message);
        assert_eq!(io[0].object, None);
        assert_eq!(io[0].filter.as_deref(), Some("V"));
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_photometry(&dir.path().join("absent"), "INDEF", &mut Diagnostics::new()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
