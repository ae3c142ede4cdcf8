//! Reporting utilities: diagnostic tallies and formatted terminal output.

pub mod format;

use std::collections::BTreeMap;

use crate::domain::{DiagnosticKind, Diagnostics, Stage};

pub use format::*;

/// Number of diagnostics per (stage, kind), in pipeline order.
pub fn diagnostic_tally(diags: &Diagnostics) -> BTreeMap<(Stage, DiagnosticKind), usize> {
    let mut tally = BTreeMap::new();
    for d in diags.iter() {
        *tally.entry((d.stage, d.kind)).or_insert(0) += 1;
    }
    tally
}
