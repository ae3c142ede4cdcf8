//! Blue/visual pairing of corrected samples.
//!
//! Within one object and night, the i-th blue sample (by time) is paired with
//! the i-th visual sample. Pairing requires equal, non-zero counts.

use std::collections::BTreeMap;

use crate::domain::{ColorFilters, Day, ExtinctionCorrectedMeasurement};
use crate::extinction::CorrectedSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    /// Neither colour filter observed that night.
    Absent,
    Unpaired { blue: usize, visual: usize },
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingError::Absent => write!(f, "no samples in the colour filters"),
            PairingError::Unpaired { blue, visual } => {
                write!(f, "unpaired filters: {blue} blue vs {visual} visual samples")
            }
        }
    }
}

/// Time-ordered blue and visual samples of equal length.
#[derive(Debug, Clone)]
pub struct PairedSamples<'a> {
    pub blue: Vec<&'a ExtinctionCorrectedMeasurement>,
    pub visual: Vec<&'a ExtinctionCorrectedMeasurement>,
}

impl<'a> PairedSamples<'a> {
    pub fn len(&self) -> usize {
        self.blue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blue.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&'a ExtinctionCorrectedMeasurement, &'a ExtinctionCorrectedMeasurement)> + '_ {
        self.blue.iter().copied().zip(self.visual.iter().copied())
    }

    pub fn mean_blue(&self) -> f64 {
        mean(&self.blue)
    }

    pub fn mean_visual(&self) -> f64 {
        mean(&self.visual)
    }

    /// `mean(blue) - mean(visual)`
    pub fn observed_color(&self) -> f64 {
        self.mean_blue() - self.mean_visual()
    }
}

fn mean(samples: &[&ExtinctionCorrectedMeasurement]) -> f64 {
    samples.iter().map(|m| m.corrected).sum::<f64>() / samples.len() as f64
}

/// Pair an object's samples for every night it was observed on, in one pass.
pub fn pair_by_day<'a>(
    series: &'a CorrectedSeries,
    color: &ColorFilters,
) -> BTreeMap<Day, Result<PairedSamples<'a>, PairingError>> {
    let mut days: BTreeMap<Day, PairedSamples<'a>> = BTreeMap::new();
    for m in &series.measurements {
        let entry = days.entry(m.day).or_insert_with(|| PairedSamples {
            blue: Vec::new(),
            visual: Vec::new(),
        });
        if m.filter == color.blue {
            entry.blue.push(m);
        } else if m.filter == color.visual {
            entry.visual.push(m);
        }
    }

    days.into_iter()
        .map(|(day, mut samples)| {
            let (blue, visual) = (samples.blue.len(), samples.visual.len());
            let result = if blue == 0 && visual == 0 {
                Err(PairingError::Absent)
            } else if blue != visual || blue == 0 {
                Err(PairingError::Unpaired { blue, visual })
            } else {
                samples.blue.sort_by(|a, b| a.time.total_cmp(&b.time));
                samples.visual.sort_by(|a, b| a.time.total_cmp(&b.time));
                Ok(samples)
            };
            (day, result)
        })
        .collect()
}
