//! Relationship discovery over ISTP pointer attributes
//!
//! A CDF variable cannot tell whether it is a coordinate: that is only known
//! by looking at which other variables point at it. One pass over every
//! attribute mapping builds the three indexes the resolver and the assembler
//! consult.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Catalog;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::{Attribute, Attributes, VariableRecord};

pub const DEPEND_PREFIX: &str = "DEPEND_";
pub const LABEL_POINTER_PREFIX: &str = "LABL_PTR_";
pub const DEPEND_TIME: &str = "DEPEND_TIME";
pub const DELTA_PLUS_VAR: &str = "DELTA_PLUS_VAR";
pub const DELTA_MINUS_VAR: &str = "DELTA_MINUS_VAR";

/// Axis number of a `<prefix><digits>` key, e.g. `DEPEND_2` -> 2.
pub fn pointer_axis(key: &str, prefix: &str) -> Option<usize> {
    let suffix = key.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Variable named by `DEPEND_<axis>`
pub fn depend(attributes: &Attributes, axis: usize) -> Option<&str> {
    attributes
        .get(&format!("{}{}", DEPEND_PREFIX, axis))
        .and_then(Attribute::as_text)
}

/// Variable named by `DEPEND_TIME`
pub fn depend_time(attributes: &Attributes) -> Option<&str> {
    attributes.get(DEPEND_TIME).and_then(Attribute::as_text)
}

/// `(axis, label variable)` for every `LABL_PTR_<axis>` attribute
pub fn label_pointers(attributes: &Attributes) -> impl Iterator<Item = (usize, &str)> {
    attributes.iter().filter_map(|(key, attribute)| {
        let axis = pointer_axis(key, LABEL_POINTER_PREFIX)?;
        Some((axis, attribute.as_text()?))
    })
}

/// The three relationship indexes of one catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    /// Every variable named by some `DEPEND_<n>` attribute
    pub dependencies: BTreeSet<String>,
    /// Label variable -> the dependency variable whose axis it labels
    pub labels: BTreeMap<String, String>,
    /// Uncertainty variable -> the variable it qualifies
    pub uncertainties: BTreeMap<String, String>,
    /// Variables whose `LABL_PTR_<n>` named a missing variable; the literal is
    /// used as their display name instead
    pub display_names: BTreeMap<String, String>,
}

impl Relationships {
    /// Build every index in one pass over `catalog`.
    pub fn discover(catalog: &Catalog, diagnostics: &mut Diagnostics) -> Self {
        let mut relationships = Self::default();
        for record in catalog.iter() {
            relationships.collect_dependencies(&record.attributes);
            relationships.collect_labels(catalog, record, diagnostics);
            relationships.collect_uncertainties(catalog, record, diagnostics);
        }
        relationships
    }

    pub fn is_dependency(&self, name: &str) -> bool {
        self.dependencies.contains(name)
    }

    pub fn is_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Label variables attached to the dependency variable `parent`
    pub fn labels_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a str> {
        self.labels
            .iter()
            .filter(move |(_, p)| p.as_str() == parent)
            .map(|(label, _)| label.as_str())
    }

    pub fn uncertainty_parent(&self, name: &str) -> Option<&str> {
        self.uncertainties.get(name).map(String::as_str)
    }

    fn collect_dependencies(&mut self, attributes: &Attributes) {
        for (key, attribute) in attributes {
            if pointer_axis(key, DEPEND_PREFIX).is_none() {
                continue;
            }
            if let Some(target) = attribute.as_text() {
                self.dependencies.insert(target.to_string());
            }
        }
    }

    fn collect_labels(
        &mut self,
        catalog: &Catalog,
        record: &VariableRecord,
        diagnostics: &mut Diagnostics,
    ) {
        let name = record.name.as_str();
        for (axis, label) in label_pointers(&record.attributes) {
            let Some(depend_name) = depend(&record.attributes, axis) else {
                continue;
            };
            // A missing DEPEND_<axis> target is reported when the axis is named
            let Some(depend_record) = catalog.get(depend_name) else {
                continue;
            };

            let axis_size = axis
                .checked_sub(1)
                .and_then(|i| record.properties.dim_sizes.get(i));
            let leading = depend_record.properties.dim_sizes.first();
            match (leading, axis_size) {
                (Some(leading), Some(size)) if leading == size => {}
                _ => continue,
            }
            if depend_record.data.is_empty() {
                continue;
            }

            if !catalog.contains(label) {
                diagnostics.warn(
                    DiagnosticKind::MissingReference,
                    Some(name),
                    format!(
                        "Variable {} points to {} as label LABL_PTR_{}, but {} does not exist. \
                         Setting {} as long_name instead.",
                        name, label, axis, label, label
                    ),
                );
                self.display_names.insert(name.to_string(), label.to_string());
                continue;
            }

            self.labels.insert(label.to_string(), depend_name.to_string());
        }
    }

    // A variable named by two different parents keeps the last one seen.
    fn collect_uncertainties(
        &mut self,
        catalog: &Catalog,
        record: &VariableRecord,
        diagnostics: &mut Diagnostics,
    ) {
        let name = record.name.as_str();
        for key in [DELTA_PLUS_VAR, DELTA_MINUS_VAR] {
            let Some(target) = record.attributes.get(key).and_then(Attribute::as_text) else {
                continue;
            };
            if !catalog.contains(target) {
                diagnostics.warn(
                    DiagnosticKind::MissingReference,
                    Some(name),
                    format!(
                        "Variable {} listed {} as {}, but no variable by that name was found.",
                        name, key, target
                    ),
                );
                continue;
            }
            self.uncertainties
                .insert(target.to_string(), name.to_string());
        }
    }
}
