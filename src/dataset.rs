//! Dataset assembly and coordinate classification
//!
//! Turns a normalized [`Catalog`] into a [`Dataset`]: every variable gets its
//! resolved dimension names, plotting-friendly attribute aliases and optional
//! fill substitution, and is then classified as either a coordinate or a data
//! variable.

use std::collections::BTreeMap;
use std::path::Path;

use crate::catalog::{Catalog, CatalogSource};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dimensions::{
    reformat_dimensions_and_data, resolve_variable_dimensions, DimensionRegistry,
};
use crate::errors::Result;
use crate::netcdf_io::NetCDFSource;
use crate::normalize::{fill_to_missing, TimeMode};
use crate::relationships::Relationships;
use crate::types::{Attribute, Attributes, Values};

/// ISTP attribute keys and the names plotting tools look for instead
pub const PLOTTING_ATTRIBUTE_ALIASES: [(&str, &str); 3] = [
    ("FIELDNAM", "standard_name"),
    ("LABLAXIS", "long_name"),
    ("UNITS", "units"),
];

/// User-selected conversion flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Convert CDF times to UTC calendar times
    pub to_datetime: bool,
    /// Convert CDF times to seconds since the Unix epoch; wins over `to_datetime`
    pub to_unixtime: bool,
    /// Replace `FILLVAL` elements with missing values
    pub fillval_to_nan: bool,
}

/// One named, dimensioned and attributed array of the output
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledVariable {
    pub dims: Vec<String>,
    pub data: Values,
    pub attributes: Attributes,
}

impl AssembledVariable {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn size(&self) -> usize {
        self.data.size()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn attribute_text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Attribute::as_text)
    }
}

/// The labeled dataset produced by a conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub coordinates: BTreeMap<String, AssembledVariable>,
    pub data_variables: BTreeMap<String, AssembledVariable>,
    pub attributes: Attributes,
    /// Every non-fatal finding of the conversion
    pub diagnostics: Diagnostics,
}

impl Dataset {
    pub fn get(&self, name: &str) -> Option<&AssembledVariable> {
        self.coordinates
            .get(name)
            .or_else(|| self.data_variables.get(name))
    }

    pub fn is_coordinate(&self, name: &str) -> bool {
        self.coordinates.contains_key(name)
    }

    pub fn is_data_variable(&self, name: &str) -> bool {
        self.data_variables.contains_key(name)
    }

    /// Coordinates first, then data variables, each in name order
    pub fn variables(&self) -> impl Iterator<Item = (&String, &AssembledVariable)> {
        self.coordinates.iter().chain(self.data_variables.iter())
    }

    pub fn len(&self) -> usize {
        self.coordinates.len() + self.data_variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every dimension name used by the dataset with the first length seen for it
    pub fn dimensions(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for (_, variable) in self.variables() {
            for (dim, &len) in variable.dims.iter().zip(variable.shape()) {
                dims.entry(dim.clone()).or_insert(len);
            }
        }
        dims
    }
}

/// `standard_name`/`long_name`/`units` copies of the matching ISTP attributes
pub fn plotting_attributes(attributes: &Attributes) -> Attributes {
    PLOTTING_ATTRIBUTE_ALIASES
        .iter()
        .filter_map(|(istp, alias)| {
            attributes
                .get(*istp)
                .map(|attribute| (alias.to_string(), attribute.clone()))
        })
        .collect()
}

/// Build one assembled variable per catalog entry, in file order.
fn build_variables(
    catalog: &Catalog,
    relationships: &Relationships,
    registry: &mut DimensionRegistry,
    fillval_to_nan: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<(String, AssembledVariable)>> {
    let mut created = Vec::with_capacity(catalog.len());

    for record in catalog.iter() {
        let dims =
            resolve_variable_dimensions(record, catalog, relationships, registry, diagnostics);
        let (dims, data) =
            reformat_dimensions_and_data(&record.name, dims, record.data.clone(), diagnostics)?;

        let mut attributes = record.attributes.clone();
        attributes.extend(plotting_attributes(&record.attributes));
        if let Some(display_name) = relationships.display_names.get(&record.name) {
            attributes.insert("LABLAXIS".to_string(), Attribute::text(display_name.clone()));
            attributes.insert("long_name".to_string(), Attribute::text(display_name.clone()));
        }

        let data = if fillval_to_nan {
            fill_to_missing(data, &attributes, &record.properties)
        } else {
            data
        };

        created.push((
            record.name.clone(),
            AssembledVariable {
                dims,
                data,
                attributes,
            },
        ));
    }

    Ok(created)
}

/// Give a label variable the dimensions of the coordinate it labels.
fn bind_label(
    label_name: &str,
    label: &mut AssembledVariable,
    parent_name: &str,
    parent: &AssembledVariable,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    if label.ndim() == parent.ndim() {
        if label.size() != parent.size() {
            diagnostics.warn(
                DiagnosticKind::LabelSizeMismatch,
                Some(label_name),
                format!(
                    "Label variable {} does not match the expected dimension sizes of {}",
                    label_name, parent_name
                ),
            );
        } else {
            label.data = label.data.reshaped(parent.shape())?;
            label.dims = parent.dims.clone();
        }
    } else if label.ndim() == 1 {
        if let Some(last) = parent.dims.last() {
            label.dims = vec![last.clone()];
        }
    } else {
        diagnostics.warn(
            DiagnosticKind::LabelSizeMismatch,
            Some(label_name),
            format!(
                "Label variable {} has {} dimensions and cannot label {}",
                label_name,
                label.ndim(),
                parent_name
            ),
        );
    }
    Ok(())
}

/// Split assembled variables into coordinates and data variables.
///
/// Label variables wait for the coordinate they label and join the
/// coordinates with its dimensions; a label whose coordinate never shows up
/// becomes a data variable. Uncertainty variables take their parent's
/// dimensions and become coordinates only when the element counts agree.
fn classify(
    created: Vec<(String, AssembledVariable)>,
    relationships: &Relationships,
    registry: &DimensionRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<(BTreeMap<String, AssembledVariable>, BTreeMap<String, AssembledVariable>)> {
    let order: Vec<String> = created.iter().map(|(name, _)| name.clone()).collect();
    let mut pending: BTreeMap<String, AssembledVariable> = created.into_iter().collect();
    let mut coordinates = BTreeMap::new();
    let mut data_variables = BTreeMap::new();

    for name in &order {
        if relationships.is_label(name) {
            continue;
        }
        let Some(variable) = pending.remove(name) else {
            continue;
        };

        if registry.is_coordinate_name(name) {
            for label_name in relationships.labels_of(name) {
                let Some(mut label) = pending.remove(label_name) else {
                    continue;
                };
                bind_label(label_name, &mut label, name, &variable, diagnostics)?;
                coordinates.insert(label_name.to_string(), label);
            }
            coordinates.insert(name.clone(), variable);
        } else if let Some(parent_name) = relationships.uncertainty_parent(name) {
            let parent = coordinates
                .get(parent_name)
                .or_else(|| data_variables.get(parent_name))
                .or_else(|| pending.get(parent_name))
                .map(|p| (p.size(), p.shape().to_vec(), p.dims.clone()));
            match parent {
                Some((size, shape, dims)) if size == variable.size() => {
                    let mut variable = variable;
                    variable.data = variable.data.reshaped(&shape)?;
                    variable.dims = dims;
                    coordinates.insert(name.clone(), variable);
                }
                _ => {
                    tracing::debug!(
                        variable = name.as_str(),
                        parent = parent_name,
                        "uncertainty variable size differs from its parent, keeping it as data"
                    );
                    data_variables.insert(name.clone(), variable);
                }
            }
        } else {
            data_variables.insert(name.clone(), variable);
        }
    }

    // Labels of coordinates that never became coordinates
    for (name, variable) in pending {
        tracing::debug!(variable = name.as_str(), "label variable without a coordinate parent");
        data_variables.insert(name, variable);
    }

    Ok((coordinates, data_variables))
}

/// Assemble a dataset from an already normalized catalog.
pub fn assemble(
    catalog: &Catalog,
    fillval_to_nan: bool,
    diagnostics: Diagnostics,
) -> Result<Dataset> {
    let mut diagnostics = diagnostics;
    let relationships = Relationships::discover(catalog, &mut diagnostics);
    let mut registry = DimensionRegistry::new();

    let created = build_variables(
        catalog,
        &relationships,
        &mut registry,
        fillval_to_nan,
        &mut diagnostics,
    )?;
    let (coordinates, data_variables) =
        classify(created, &relationships, &registry, &mut diagnostics)?;

    tracing::debug!(
        coordinates = coordinates.len(),
        data_variables = data_variables.len(),
        diagnostics = diagnostics.len(),
        "assembled dataset"
    );

    Ok(Dataset {
        coordinates,
        data_variables,
        attributes: catalog.global_attributes().clone(),
        diagnostics,
    })
}

/// Convert everything `source` holds into a labeled [`Dataset`].
pub fn cdf_to_dataset<S: CatalogSource + ?Sized>(
    source: &S,
    options: &ConversionOptions,
) -> Result<Dataset> {
    let mut diagnostics = Diagnostics::new();
    let mode = TimeMode::from_flags(options.to_datetime, options.to_unixtime, &mut diagnostics);
    let catalog = Catalog::from_source(source, mode, &mut diagnostics)?;
    assemble(&catalog, options.fillval_to_nan, diagnostics)
}

/// Open a netCDF file carrying ISTP metadata and convert it.
pub fn open_dataset<P: AsRef<Path>>(path: P, options: &ConversionOptions) -> Result<Dataset> {
    let source = NetCDFSource::open(path)?;
    cdf_to_dataset(&source, options)
}
