//! Measurement aggregation.
//!
//! Turns identity-resolved photometry rows into one time-ordered series of
//! [`InstrumentalMeasurement`]s per catalog object, and exposes the explicit
//! day / (day, filter) groupings the later stages regress over.

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub mod field;

pub use field::{collect_field_frames, FieldFrame, FieldStar};

use crate::domain::{
    Catalog, Day, Diagnostic, DiagnosticKind, Diagnostics, InstrumentalMeasurement, Stage,
};
use crate::io::identity::IdentityMap;
use crate::io::photometry::PhotometryRow;

/// All measurements of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSeries {
    pub object: String,
    pub is_standard: bool,
    pub measurements: Vec<InstrumentalMeasurement>,
}

impl ObjectSeries {
    /// Measurements with a defined instrumental magnitude.
    pub fn defined(&self) -> impl Iterator<Item = &InstrumentalMeasurement> {
        self.measurements.iter().filter(|m| m.magnitude.is_some())
    }
}

/// Per-object instrumental series, in catalog order.
///
/// Objects never seen in any image are absent.
#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    series: Vec<ObjectSeries>,
    index: HashMap<String, usize>,
    field_frames: BTreeMap<String, Vec<FieldFrame>>,
    /// Rows whose `(field, source_id)` matched no object.
    pub unresolved_rows: usize,
}

impl ObservationSet {
    /// Group measurements by object.
    ///
    /// Measurements of objects missing from the catalog are dropped with a
    /// diagnostic; undefined magnitudes are kept (so they are still written
    /// to the instrumental output) but flagged once per occurrence.
    pub fn from_measurements(
        catalog: &Catalog,
        measurements: impl IntoIterator<Item = InstrumentalMeasurement>,
        diags: &mut Diagnostics,
    ) -> Self {
        let mut grouped: HashMap<String, Vec<InstrumentalMeasurement>> = HashMap::new();
        let mut unknown: BTreeSet<String> = BTreeSet::new();

        for m in measurements {
            if !catalog.contains(&m.object) {
                unknown.insert(m.object.clone());
                continue;
            }
            if m.magnitude.is_none() {
                diags.push(
                    Diagnostic::new(
                        Stage::Aggregate,
                        DiagnosticKind::InvalidSample,
                        format!("undefined instrumental magnitude in {} at {}", m.image, m.time),
                    )
                    .object(m.object.clone())
                    .day(m.day)
                    .filter(m.filter.clone()),
                );
            }
            grouped.entry(m.object.clone()).or_default().push(m);
        }

        for name in unknown {
            diags.push(
                Diagnostic::new(Stage::Aggregate, DiagnosticKind::MissingData, "no catalog entry")
                    .object(name),
            );
        }

        let mut series = Vec::new();
        for obj in catalog.objects() {
            let Some(mut measurements) = grouped.remove(&obj.name) else {
                continue;
            };
            measurements.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| a.filter.cmp(&b.filter)));
            series.push(ObjectSeries {
                object: obj.name.clone(),
                is_standard: obj.is_standard,
                measurements,
            });
        }

        let index = series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.object.clone(), i))
            .collect();

        Self {
            series,
            index,
            field_frames: BTreeMap::new(),
            unresolved_rows: 0,
        }
    }

    pub fn get(&self, object: &str) -> Option<&ObjectSeries> {
        self.index.get(object).map(|&i| &self.series[i])
    }

    /// Same-image field stars of a target, in time order.
    pub fn field_frames(&self, object: &str) -> &[FieldFrame] {
        self.field_frames.get(object).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectSeries> {
        self.series.iter()
    }

    pub fn standards(&self) -> impl Iterator<Item = &ObjectSeries> {
        self.series.iter().filter(|s| s.is_standard)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn measurement_count(&self) -> usize {
        self.series.iter().map(|s| s.measurements.len()).sum()
    }

    /// Every observing night present in the set.
    pub fn days(&self) -> BTreeSet<Day> {
        self.series
            .iter()
            .flat_map(|s| s.measurements.iter().map(|m| m.day))
            .collect()
    }

    /// Defined measurements of all objects keyed by (day, filter).
    pub fn by_day_filter(&self) -> BTreeMap<(Day, String), Vec<&InstrumentalMeasurement>> {
        let mut groups: BTreeMap<(Day, String), Vec<&InstrumentalMeasurement>> = BTreeMap::new();
        for s in &self.series {
            for m in s.defined() {
                groups.entry((m.day, m.filter.clone())).or_default().push(m);
            }
        }
        groups
    }
}

/// Resolve photometry rows through the identity map and aggregate them.
///
/// Field frames of the targets are collected first, so rows that resolve to
/// no object still serve as field stars.
pub fn aggregate_rows(
    catalog: &Catalog,
    identity: &IdentityMap,
    rows: Vec<PhotometryRow>,
    diags: &mut Diagnostics,
) -> ObservationSet {
    let field_frames = collect_field_frames(catalog, identity, &rows);

    let mut unresolved = 0usize;
    let measurements: Vec<InstrumentalMeasurement> = rows
        .into_iter()
        .filter_map(|row| {
            let field = identity.field_of(&row.image);
            let Some(object) = identity.resolve(field, row.source_id) else {
                unresolved += 1;
                return None;
            };
            Some(InstrumentalMeasurement {
                object: object.to_string(),
                image: row.image,
                day: Day::from_time(row.time),
                time: row.time,
                filter: row.filter,
                magnitude: row.magnitude,
                magnitude_error: row.magnitude_error,
                airmass: row.airmass,
            })
        })
        .collect();

    if unresolved > 0 {
        tracing::debug!(rows = unresolved, "photometry rows without an identity entry ignored");
    }

    let mut set = ObservationSet::from_measurements(catalog, measurements, diags);
    set.unresolved_rows = unresolved;
    set.field_frames = field_frames;
    tracing::info!(
        objects = set.len(),
        measurements = set.measurement_count(),
        nights = set.days().len(),
        field_targets = set.field_frames.len(),
        "aggregated instrumental measurements"
    );
    set
}
