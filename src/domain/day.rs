//! Observation-night assignment.

use serde::{Deserialize, Serialize};

/// Integer day number identifying an observing night.
///
/// A night is labelled by the day on which it began: measurements taken
/// shortly after the day boundary still belong to the previous evening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(pub i64);

impl Day {
    /// Derive the night of a fractional (modified) Julian timestamp `D.fff`.
    ///
    /// If the first decimal digit of the fraction is 0..=4 the night is
    /// `D - 1`, otherwise `D`. The boundary is deliberately coarse and must
    /// not be moved: output grouping depends on it.
    pub fn from_time(time: f64) -> Self {
        let whole = time.floor();
        let first_decimal = ((time - whole) * 10.0).floor() as i64;
        if first_decimal <= 4 {
            Day(whole as i64 - 1)
        } else {
            Day(whole as i64)
        }
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
