//! Non-fatal problems found while calibrating.
//!
//! Missing data and invalid samples skip the affected unit of work and the
//! run continues; each occurrence becomes a [`Diagnostic`] and is logged.

use serde::Serialize;

use crate::domain::Day;

/// Pipeline stage that raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingest,
    Aggregate,
    Extinction,
    Correction,
    Transformation,
    Calibration,
    Export,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Aggregate => "aggregate",
            Stage::Extinction => "extinction",
            Stage::Correction => "correction",
            Stage::Transformation => "transformation",
            Stage::Calibration => "calibration",
            Stage::Export => "export",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Catalog entry, standard magnitude, coefficient record or filter pairing absent.
    MissingData,
    /// Undefined magnitude, out-of-range value or rejected regression slope.
    InvalidSample,
    /// The regression primitive could not produce a fit for a group.
    RegressionFailed,
    /// Reading or writing a single file failed.
    Io,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::MissingData => "missing-data",
            DiagnosticKind::InvalidSample => "invalid-sample",
            DiagnosticKind::RegressionFailed => "regression-failed",
            DiagnosticKind::Io => "io",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            object: None,
            day: None,
            filter: None,
            message: message.into(),
        }
    }

    pub fn object(mut self, name: impl Into<String>) -> Self {
        self.object = Some(name.into());
        self
    }

    pub fn day(mut self, day: Day) -> Self {
        self.day = Some(day);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}]", self.stage.label(), self.kind.label())?;
        if let Some(object) = &self.object {
            write!(f, " object={object}")?;
        }
        if let Some(day) = self.day {
            write!(f, " day={day}")?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " filter={filter}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Ordered, append-only diagnostic log for one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the log.
    ///
    /// Undefined-magnitude notices can number in the thousands on a long
    /// night, so invalid samples from ingest/aggregation log at debug level.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match (diagnostic.stage, diagnostic.kind) {
            (Stage::Aggregate | Stage::Correction, DiagnosticKind::InvalidSample) => {
                tracing::debug!("{diagnostic}");
            }
            _ => tracing::warn!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, stage: Stage, kind: DiagnosticKind) -> usize {
        self.entries
            .iter()
            .filter(|d| d.stage == stage && d.kind == kind)
            .count()
    }

    /// Diagnostics raised for one object (any stage).
    pub fn for_object<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries
            .iter()
            .filter(move |d| d.object.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let d = Diagnostic::new(Stage::Calibration, DiagnosticKind::MissingData, "unpaired filters")
            .object("X")
            .day(Day(5))
            .filter("B");
        assert_eq!(
            d.to_string(),
            "[calibration/missing-data] object=X day=5 filter=B unpaired filters"
        );
    }

    #[test]
    fn counts_by_stage_and_kind() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(Stage::Extinction, DiagnosticKind::InvalidSample, "a").object("A"));
        diags.push(Diagnostic::new(Stage::Extinction, DiagnosticKind::InvalidSample, "b"));
        diags.push(Diagnostic::new(Stage::Export, DiagnosticKind::Io, "c").object("A"));

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(Stage::Extinction, DiagnosticKind::InvalidSample), 2);
        assert_eq!(diags.count(Stage::Export, DiagnosticKind::MissingData), 0);
        assert_eq!(diags.for_object("A").count(), 2);
    }
}
