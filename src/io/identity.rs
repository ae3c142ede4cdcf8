//! Explicit source identity.
//!
//! Each photometry row carries a source id that is only meaningful inside its
//! field (the image's target). `IdentityMap` resolves `(field, source_id)` to
//! a catalog object name, so attribution never depends on row order.
//!
//! Defaults come from the catalog: in an object's own field, source `0` is the
//! object itself. An optional tab-separated file adds explicit entries:
//!
//! ```text
//! field  source_id  object_name
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::{Catalog, Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::error::AppError;
use crate::io::photometry::field_from_image_name;

/// Source id of the field's own object.
pub const FIELD_OBJECT_SOURCE_ID: u32 = 0;

#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: HashMap<(String, u32), String>,
    fields: HashSet<String>,
}

impl IdentityMap {
    /// Identity entries implied by the catalog alone.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut map = Self::default();
        for o in catalog.objects() {
            map.insert(o.name.clone(), FIELD_OBJECT_SOURCE_ID, o.name.clone());
        }
        map
    }

    pub fn insert(&mut self, field: impl Into<String>, source_id: u32, object: impl Into<String>) {
        let field = field.into();
        self.fields.insert(field.clone());
        self.entries.insert((field, source_id), object.into());
    }

    /// Field an image belongs to.
    ///
    /// An image stem that is itself a known field (`SA98-670`) is taken as is;
    /// otherwise a trailing `-<digits>` sequence number is dropped.
    pub fn field_of<'a>(&self, image: &'a str) -> &'a str {
        if self.fields.contains(image) {
            image
        } else {
            field_from_image_name(image)
        }
    }

    /// The field's own object, if the field is one.
    pub fn field_object(&self, field: &str) -> Option<&str> {
        self.resolve(field, FIELD_OBJECT_SOURCE_ID)
    }

    pub fn resolve(&self, field: &str, source_id: u32) -> Option<&str> {
        self.entries
            .get(&(field.to_string(), source_id))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge explicit entries from a file.
    pub fn extend_from_file(&mut self, path: &Path, catalog: &Catalog, diags: &mut Diagnostics) -> Result<(), AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::input(format!("Failed to open identity file '{}': {e}", path.display()))
        })?;
        let added = self.extend_from_reader(file, catalog, diags)?;
        tracing::info!(entries = added, "loaded identity file {}", path.display());
        Ok(())
    }

    /// Merge explicit entries; returns how many were accepted.
    pub fn extend_from_reader<R: Read>(
        &mut self,
        source: R,
        catalog: &Catalog,
        diags: &mut Diagnostics,
    ) -> Result<usize, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(source);

        let mut added = 0usize;
        for (idx, result) in reader.records().enumerate() {
            let line = idx + 1;
            let record = result
                .map_err(|e| AppError::input(format!("Failed to read identity line {line}: {e}")))?;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let (Some(field), Some(id), Some(object)) = (record.get(0), record.get(1), record.get(2)) else {
                diags.push(Diagnostic::new(
                    Stage::Ingest,
                    DiagnosticKind::MissingData,
                    format!("identity line {line} skipped: expected field, source id and object"),
                ));
                continue;
            };
            let Ok(source_id) = id.parse::<u32>() else {
                diags.push(Diagnostic::new(
                    Stage::Ingest,
                    DiagnosticKind::InvalidSample,
                    format!("identity line {line} skipped: invalid source id `{id}`"),
                ));
                continue;
            };
            if !catalog.contains(object) {
                diags.push(
                    Diagnostic::new(
                        Stage::Ingest,
                        DiagnosticKind::MissingData,
                        format!("identity line {line} skipped: object not in catalog"),
                    )
                    .object(object),
                );
                continue;
            }

            self.insert(field, source_id, object);
            added += 1;
        }
        Ok(added)
    }
}
