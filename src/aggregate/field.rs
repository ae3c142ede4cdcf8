//! Field stars of target objects.
//!
//! Every image taken of a target's own field also measures the other stars in
//! that field. Those rows are never attributed to a catalog object, but they
//! give a differential light curve that needs no calibration at all:
//!
//! ```text
//! diff  = target - mean(field stars)
//! error = target_error + mean(field star errors)
//! ```
//!
//! Only field stars with both a magnitude and an error count toward the mean.

use std::collections::BTreeMap;

use crate::domain::Catalog;
use crate::io::identity::{IdentityMap, FIELD_OBJECT_SOURCE_ID};
use crate::io::photometry::PhotometryRow;

/// One other source in a target's image.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStar {
    pub source_id: u32,
    pub magnitude: Option<f64>,
    pub error: Option<f64>,
}

impl FieldStar {
    fn defined(&self) -> Option<(f64, f64)> {
        Some((self.magnitude?, self.error?))
    }
}

/// A target's own measurement in one image plus the field stars of that image.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFrame {
    pub object: String,
    pub image: String,
    pub time: f64,
    pub filter: String,
    pub magnitude: Option<f64>,
    pub error: Option<f64>,
    /// Ordered by source id.
    pub field_stars: Vec<FieldStar>,
}

impl FieldFrame {
    /// Differential magnitude and its error, if the target and at least one
    /// field star are defined.
    pub fn differential(&self) -> Option<(f64, f64)> {
        let (magnitude, error) = (self.magnitude?, self.error?);

        let defined: Vec<(f64, f64)> = self.field_stars.iter().filter_map(FieldStar::defined).collect();
        if defined.is_empty() {
            return None;
        }
        let n = defined.len() as f64;
        let mean_mag = defined.iter().map(|(m, _)| m).sum::<f64>() / n;
        let mean_err = defined.iter().map(|(_, e)| e).sum::<f64>() / n;
        Some((magnitude - mean_mag, error + mean_err))
    }
}

/// Field frames of every non-standard object, keyed by object name and
/// ordered by time then filter.
///
/// An image contributes a frame when its field is a target object and the
/// target's own source is present in it.
pub fn collect_field_frames(
    catalog: &Catalog,
    identity: &IdentityMap,
    rows: &[PhotometryRow],
) -> BTreeMap<String, Vec<FieldFrame>> {
    let mut images: BTreeMap<(&str, &str), Vec<&PhotometryRow>> = BTreeMap::new();
    for row in rows {
        images.entry((row.filter.as_str(), row.image.as_str())).or_default().push(row);
    }

    let mut frames: BTreeMap<String, Vec<FieldFrame>> = BTreeMap::new();
    for ((filter, image), mut sources) in images {
        let field = identity.field_of(image);
        let Some(object) = identity.field_object(field) else {
            continue;
        };
        if catalog.get(object).is_none_or(|o| o.is_standard) {
            continue;
        }
        let Some(target) = sources.iter().find(|r| r.source_id == FIELD_OBJECT_SOURCE_ID).copied() else {
            continue;
        };

        sources.sort_by_key(|r| r.source_id);
        let field_stars = sources
            .iter()
            .filter(|r| r.source_id != FIELD_OBJECT_SOURCE_ID)
            .map(|r| FieldStar {
                source_id: r.source_id,
                magnitude: r.magnitude,
                error: r.magnitude_error,
            })
            .collect();

        frames.entry(object.to_string()).or_default().push(FieldFrame {
            object: object.to_string(),
            image: image.to_string(),
            time: target.time,
            filter: filter.to_string(),
            magnitude: target.magnitude,
            error: target.magnitude_error,
            field_stars,
        });
    }

    for list in frames.values_mut() {
        list.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| a.filter.cmp(&b.filter)));
    }
    frames
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{CatalogObject, SkyPosition};

    fn star(source_id: u32, magnitude: Option<f64>, error: Option<f64>) -> FieldStar {
        FieldStar {
            source_id,
            magnitude,
            error,
        }
    }

    fn frame(magnitude: Option<f64>, field_stars: Vec<FieldStar>) -> FieldFrame {
        FieldFrame {
            object: "T".to_string(),
            image: "T-001".to_string(),
            time: 60380.7,
            filter: "V".to_string(),
            magnitude,
            error: Some(0.01),
            field_stars,
        }
    }

    #[test]
    fn differential_uses_defined_field_stars_only() {
        let f = frame(
            Some(12.0),
            vec![
                star(1, Some(13.0), Some(0.02)),
                star(2, Some(14.0), None),
                star(3, Some(15.0), Some(0.04)),
            ],
        );
        let (diff, err) = f.differential().unwrap();
        assert!((diff - (12.0 - 14.0)).abs() < 1e-12);
        assert!((err - (0.01 + 0.03)).abs() < 1e-12);
    }

    #[test]
    fn differential_needs_target_and_a_field_star() {
        assert!(frame(None, vec![star(1, Some(13.0), Some(0.02))]).differential().is_none());
        assert!(frame(Some(12.0), vec![star(1, None, None)]).differential().is_none());
        assert!(frame(Some(12.0), Vec::new()).differential().is_none());
    }

    #[test]
    fn frames_come_from_target_fields_only() {
        let obj = |name: &str, std: bool| CatalogObject {
            name: name.to_string(),
            position: SkyPosition::default(),
            is_standard: std,
            standard_mags: BTreeMap::new(),
        };
        let catalog = Catalog::new(vec![obj("T-12", false), obj("S", true)]).unwrap();
        let identity = IdentityMap::from_catalog(&catalog);
        let row = |image: &str, filter: &str, id: u32, time: f64, mag: f64| PhotometryRow {
            image: image.to_string(),
            filter: filter.to_string(),
            source_id: id,
            time,
            magnitude: Some(mag),
            magnitude_error: Some(0.01),
            airmass: 1.2,
        };

        let rows = vec![
            row("T-12-002", "V", 2, 60380.8, 14.2),
            row("T-12-002", "V", 0, 60380.8, 12.2),
            row("T-12-002", "V", 1, 60380.8, 13.2),
            row("T-12", "B", 0, 60380.7, 12.9),
            row("S-001", "V", 0, 60380.7, 10.0),
            row("S-001", "V", 1, 60380.7, 11.0),
            // No target row in this image.
            row("T-12-003", "V", 1, 60380.9, 13.1),
        ];
        let frames = collect_field_frames(&catalog, &identity, &rows);

        assert_eq!(frames.len(), 1);
        let t = &frames["T-12"];
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].image, "T-12");
        assert!(t[0].field_stars.is_empty());
        assert_eq!(t[1].magnitude, Some(12.2));
        let ids: Vec<u32> = t[1].field_stars.iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
