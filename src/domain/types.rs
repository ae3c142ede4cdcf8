//! Shared domain types.
//!
//! Records produced by a pipeline stage are write-once: later stages derive
//! new records from them and never mutate them in place.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Day;
use crate::error::AppError;

/// Default textual marker for "no value" in photometry and catalog files.
pub const DEFAULT_UNDEFINED_SENTINEL: &str = "INDEF";

/// Sky position in decimal degrees. Carried for identity only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// An object of interest as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub name: String,
    pub position: SkyPosition,
    pub is_standard: bool,
    /// Reference magnitude per filter. Filters the object was never
    /// calibrated in are simply absent.
    pub standard_mags: BTreeMap<String, f64>,
}

impl CatalogObject {
    pub fn standard_mag(&self, filter: &str) -> Option<f64> {
        self.standard_mags.get(filter).copied()
    }
}

/// Immutable, name-indexed list of catalog objects (file order preserved).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    objects: Vec<CatalogObject>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(objects: Vec<CatalogObject>) -> Result<Self, AppError> {
        let mut index = HashMap::with_capacity(objects.len());
        for (i, obj) in objects.iter().enumerate() {
            if index.insert(obj.name.clone(), i).is_some() {
                return Err(AppError::input(format!(
                    "Duplicate catalog object name: `{}`",
                    obj.name
                )));
            }
        }
        Ok(Self { objects, index })
    }

    pub fn get(&self, name: &str) -> Option<&CatalogObject> {
        self.index.get(name).map(|&i| &self.objects[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn objects(&self) -> &[CatalogObject] {
        &self.objects
    }

    pub fn standards(&self) -> impl Iterator<Item = &CatalogObject> {
        self.objects.iter().filter(|o| o.is_standard)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// One instrumental magnitude of one object in one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentalMeasurement {
    pub object: String,
    /// Image (file stem) the measurement came from.
    pub image: String,
    pub day: Day,
    /// Fractional (modified) Julian date.
    pub time: f64,
    pub filter: String,
    /// `None` when the photometry marked the magnitude undefined.
    pub magnitude: Option<f64>,
    pub magnitude_error: Option<f64>,
    pub airmass: f64,
}

/// Fitted extinction relation for one night and filter.
///
/// `instrumental - standard = slope·airmass + intercept`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtinctionCoefficientRecord {
    pub day: Day,
    pub filter: String,
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub n_samples: usize,
    /// Standard objects whose accepted samples were pooled.
    pub objects: Vec<String>,
}

/// The extinction term applied to a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ExtinctionTerm {
    Fitted { slope: f64, intercept: f64 },
    /// No record for the (day, filter): magnitudes pass through unchanged.
    Neutral,
}

impl ExtinctionTerm {
    pub const NEUTRAL_SLOPE: f64 = 1.0;
    pub const NEUTRAL_INTERCEPT: f64 = 0.0;

    pub fn from_record(record: Option<&ExtinctionCoefficientRecord>) -> Self {
        match record {
            Some(r) => ExtinctionTerm::Fitted {
                slope: r.slope,
                intercept: r.intercept,
            },
            None => ExtinctionTerm::Neutral,
        }
    }

    pub fn slope(self) -> f64 {
        match self {
            ExtinctionTerm::Fitted { slope, .. } => slope,
            ExtinctionTerm::Neutral => Self::NEUTRAL_SLOPE,
        }
    }

    pub fn intercept(self) -> f64 {
        match self {
            ExtinctionTerm::Fitted { intercept, .. } => intercept,
            ExtinctionTerm::Neutral => Self::NEUTRAL_INTERCEPT,
        }
    }

    pub fn is_fitted(self) -> bool {
        matches!(self, ExtinctionTerm::Fitted { .. })
    }

    /// `corrected = instrumental - intercept - slope·airmass`
    pub fn apply(self, instrumental: f64, airmass: f64) -> f64 {
        match self {
            ExtinctionTerm::Fitted { slope, intercept } => instrumental - intercept - slope * airmass,
            ExtinctionTerm::Neutral => instrumental,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtinctionCorrectedMeasurement {
    pub object: String,
    pub day: Day,
    pub time: f64,
    pub filter: String,
    pub corrected: f64,
    pub instrumental: f64,
    pub magnitude_error: Option<f64>,
    pub airmass: f64,
    pub term: ExtinctionTerm,
}

/// Per-night colour/magnitude transformation.
///
/// - `(V_std - V_obs) = c1·(B-V)_std + c2`
/// - `(B-V)_std = c3·(B-V)_obs + c4`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationCoefficientRecord {
    pub day: Day,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibratedMeasurement {
    pub object: String,
    pub day: Day,
    pub time: f64,
    pub filter: String,
    pub calibrated: f64,
    pub corrected: f64,
    pub instrumental: f64,
}

/// Which samples are checked together by the extinction slope gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GateScope {
    /// One gate per object and night, all filters together.
    ObjectDay,
    /// One gate per object, night and filter.
    ObjectDayFilter,
}

/// The two filters forming the colour index (blue minus visual).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorFilters {
    pub blue: String,
    pub visual: String,
}

impl Default for ColorFilters {
    fn default() -> Self {
        Self {
            blue: "B".to_string(),
            visual: "V".to_string(),
        }
    }
}

/// Options of the in-memory calibration core.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOptions {
    pub color: ColorFilters,
    /// Gate sets with fewer samples never reach the pooled fit.
    pub min_gate_samples: usize,
    pub gate_scope: GateScope,
    /// Fan independent regression groups out over the rayon pool.
    pub parallel: bool,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            color: ColorFilters::default(),
            min_gate_samples: 1,
            gate_scope: GateScope::ObjectDay,
            parallel: true,
        }
    }
}

impl CalibrationOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.color.blue.trim().is_empty() || self.color.visual.trim().is_empty() {
            return Err(AppError::input("Blue and visual filter names must not be empty."));
        }
        if self.color.blue == self.color.visual {
            return Err(AppError::input(format!(
                "Blue and visual filters must differ (both are `{}`).",
                self.color.blue
            )));
        }
        if self.min_gate_samples == 0 {
            return Err(AppError::input("`--min-gate-samples` must be at least 1."));
        }
        Ok(())
    }
}

/// A full `photcal calibrate` run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub catalog_path: PathBuf,
    pub photometry_dir: PathBuf,
    pub identity_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub undefined_sentinel: String,
    pub options: CalibrationOptions,
}
