//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline stays free of presentation code and
//! output changes stay localized.

use crate::app::pipeline::RunOutput;
use crate::domain::{CalibrationConfig, Diagnostics, ExtinctionCoefficientRecord, TransformationCoefficientRecord};
use crate::report::diagnostic_tally;

/// Format the full run summary (inputs, counts, coefficient tables, diagnostics).
pub fn format_run_summary(output: &RunOutput, config: &CalibrationConfig) -> String {
    let run = &output.run;
    let mut out = String::new();

    out.push_str("=== photcal - photometric calibration ===\n");
    out.push_str(&format!(
        "Catalog: {} ({} objects, {} standards)\n",
        config.catalog_path.display(),
        output.catalog.len(),
        output.catalog.standards().count(),
    ));
    out.push_str(&format!(
        "Photometry: {} ({} files read, {} failed)\n",
        config.photometry_dir.display(),
        output.files_read,
        output.files_failed,
    ));
    out.push_str(&format!(
        "Colour: {}-{} | gate: {:?}, min {} samples\n",
        config.options.color.blue,
        config.options.color.visual,
        config.options.gate_scope,
        config.options.min_gate_samples,
    ));
    out.push_str(&format!(
        "Measurements: instrumental={} corrected={} calibrated={} | objects={} nights={}\n",
        run.observations.measurement_count(),
        run.corrected.measurement_count(),
        run.calibrated.measurement_count(),
        run.observations.len(),
        run.observations.days().len(),
    ));
    out.push_str(&format!(
        "Output: {} ({} files, {} objects failed)\n",
        config.output_dir.display(),
        output.export.files_written,
        output.export.objects_failed,
    ));

    out.push_str("\nExtinction coefficients:\n");
    let extinction: Vec<&ExtinctionCoefficientRecord> = run.extinction.records().collect();
    out.push_str(&format_extinction_table(&extinction));

    out.push_str("\nTransformation coefficients:\n");
    let transformation: Vec<&TransformationCoefficientRecord> = run.transformation.records().collect();
    out.push_str(&format_transformation_table(&transformation));

    out.push_str("\nDiagnostics:\n");
    out.push_str(&format_diagnostic_tally(&run.diagnostics));

    out
}

pub fn format_extinction_table(records: &[&ExtinctionCoefficientRecord]) -> String {
    if records.is_empty() {
        return "  (none)\n".to_string();
    }
    let mut out = String::new();
    push_row(
        &mut out,
        format!(
            "{:>8} {:<6} {:>10} {:>10} {:>7} {:>5}  {}",
            "night", "filter", "slope", "intercept", "r", "n", "standards"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<8} {:-<6} {:-<10} {:-<10} {:-<7} {:-<5}  {:-<9}", "", "", "", "", "", "", ""),
    );
    for r in records {
        push_row(
            &mut out,
            format!(
                "{:>8} {:<6} {:>10.5} {:>10.5} {:>7.3} {:>5}  {}",
                r.day,
                truncate(&r.filter, 6),
                r.slope,
                r.intercept,
                r.r,
                r.n_samples,
                r.objects.join(","),
            ),
        );
    }
    out
}

pub fn format_transformation_table(records: &[&TransformationCoefficientRecord]) -> String {
    if records.is_empty() {
        return "  (none)\n".to_string();
    }
    let mut out = String::new();
    push_row(
        &mut out,
        format!(
            "{:>8} {:>10} {:>10} {:>10} {:>10}  {}",
            "night", "c1", "c2", "c3", "c4", "standards"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<8} {:-<10} {:-<10} {:-<10} {:-<10}  {:-<9}", "", "", "", "", "", ""),
    );
    for r in records {
        push_row(
            &mut out,
            format!(
                "{:>8} {:>10.5} {:>10.5} {:>10.5} {:>10.5}  {}",
                r.day,
                r.c1,
                r.c2,
                r.c3,
                r.c4,
                r.objects.join(","),
            ),
        );
    }
    out
}

pub fn format_diagnostic_tally(diags: &Diagnostics) -> String {
    let tally = diagnostic_tally(diags);
    if tally.is_empty() {
        return "  (none)\n".to_string();
    }
    let mut out = String::new();
    for ((stage, kind), n) in tally {
        out.push_str(&format!("  {:<15} {:<18} {n}\n", stage.label(), kind.label()));
    }
    out
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Day, Diagnostic, DiagnosticKind, Stage};

    #[test]
    fn extinction_table_layout() {
        let rec = ExtinctionCoefficientRecord {
            day: Day(60380),
            filter: "B".to_string(),
            slope: 0.25,
            intercept: 2.1,
            r: 0.987,
            n_samples: 6,
            objects: vec!["A".to_string(), "S".to_string()],
        };
        let text = format_extinction_table(&[&rec]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("   night filter"));
        assert_eq!(lines[2], "   60380 B         0.25000    2.10000   0.987     6  A,S");
    }

    #[test]
    fn empty_tables_say_none() {
        assert_eq!(format_transformation_table(&[]), "  (none)\n");
        assert_eq!(format_diagnostic_tally(&Diagnostics::new()), "  (none)\n");
    }

    #[test]
    fn tally_groups_by_stage_and_kind() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(Stage::Calibration, DiagnosticKind::MissingData, "x"));
        diags.push(Diagnostic::new(Stage::Extinction, DiagnosticKind::InvalidSample, "y"));
        diags.push(Diagnostic::new(Stage::Calibration, DiagnosticKind::MissingData, "z"));

        let text = format_diagnostic_tally(&diags);
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  extinction"));
        assert!(lines[0].ends_with(" 1"));
        assert!(lines[1].starts_with("  calibration"));
        assert!(lines[1].ends_with(" 2"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("Halpha", 4), "Hal.");
        assert_eq!(truncate("B", 6), "B");
    }
}
