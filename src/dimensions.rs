//! Dimension resolution
//!
//! CDF stores each variable as a record axis plus a list of declared
//! dimension sizes, with no names. This module names every axis, reusing a
//! dependency variable's name when the metadata supports it and otherwise
//! sharing or minting anonymous `unlimited<N>` / `dim<N>` dimensions.
//!
//! The [`DimensionRegistry`] accumulates what has been named so far during
//! one conversion and is passed explicitly through every call.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::errors::Result;
use crate::relationships::{depend, depend_time, Relationships, DEPEND_PREFIX, DEPEND_TIME};
use crate::types::{Values, VariableRecord};

/// Dimension name used when a variable has neither dimensions nor data
pub const EMPTY_DIMENSION: &str = "dim_empty";

/// Suffix separating a coordinate's own record axis from the axis it names
pub const DIMENSION_SUFFIX: &str = "_dim";

/// A resolved name for one axis of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionBinding {
    pub name: String,
    pub size: usize,
    /// The name is shared with other variables and registered as a dependency dimension
    pub is_shared_dependency: bool,
    /// The name was created for this variable
    pub is_newly_minted: bool,
}

impl DimensionBinding {
    fn shared(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            is_shared_dependency: true,
            is_newly_minted: false,
        }
    }
}

/// Which of the anonymous registries a binding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKind {
    Record,
    Regular,
}

/// Dimensions named so far during one conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionRegistry {
    /// Anonymous record dimensions, in minting order
    pub unlimited_dims: Vec<(String, usize)>,
    /// Anonymous non-record dimensions, in minting order
    pub regular_dims: Vec<(String, usize)>,
    /// Every shared dimension name and its size
    pub depend_dims: BTreeMap<String, usize>,
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding. Calling this twice with the same binding is harmless.
    pub fn bind(&mut self, binding: &DimensionBinding, kind: DimensionKind) {
        if binding.is_shared_dependency {
            self.depend_dims.insert(binding.name.clone(), binding.size);
        }
        if binding.is_newly_minted {
            let dims = match kind {
                DimensionKind::Record => &mut self.unlimited_dims,
                DimensionKind::Regular => &mut self.regular_dims,
            };
            if !dims.iter().any(|(name, _)| name == &binding.name) {
                dims.push((binding.name.clone(), binding.size));
            }
        }
    }

    /// True if `name` is a shared dimension, directly or through its `_dim` form.
    pub fn is_coordinate_name(&self, name: &str) -> bool {
        self.depend_dims.contains_key(name)
            || self
                .depend_dims
                .contains_key(&format!("{}{}", name, DIMENSION_SUFFIX))
    }

    fn find_unlimited(&self, length: usize) -> Option<&str> {
        self.unlimited_dims
            .iter()
            .find(|(_, len)| *len == length)
            .map(|(name, _)| name.as_str())
    }

    fn find_regular(&self, size: usize) -> Option<&str> {
        self.regular_dims
            .iter()
            .find(|(_, len)| *len == size)
            .map(|(name, _)| name.as_str())
    }
}

/// Name of the axis a dependency variable provides; record-varying
/// coordinates get `_dim` so the axis differs from their own record axis.
fn dependency_axis_name(record: &VariableRecord) -> String {
    if record.properties.has_records() {
        format!("{}{}", record.name, DIMENSION_SUFFIX)
    } else {
        record.name.clone()
    }
}

/// A `DEPEND_0`/`DEPEND_TIME` target usable as the record dimension of `record`.
fn record_dependency(
    record: &VariableRecord,
    key: &str,
    target: &str,
    catalog: &Catalog,
    diagnostics: &mut Diagnostics,
) -> Option<DimensionBinding> {
    let Some(dependency) = catalog.get(target) else {
        diagnostics.warn(
            DiagnosticKind::MissingReference,
            Some(&record.name),
            format!(
                "Variable {} listed {} as {}, but no variable by that name was found.",
                record.name, key, target
            ),
        );
        return None;
    };

    if dependency.data.len() != record.data.len() {
        diagnostics.warn(
            DiagnosticKind::ShapeMismatch,
            Some(&record.name),
            format!(
                "Variable {} listed {} as {}, but it has {} records instead of {}.",
                record.name,
                key,
                target,
                dependency.data.len(),
                record.data.len()
            ),
        );
        return None;
    }

    Some(DimensionBinding::shared(target, record.data.len()))
}

/// Resolve the record (leading) dimension of `record` and register it.
///
/// Returns `None` for variables that do not vary by record or whose last
/// record index is zero.
pub fn resolve_record_dimension(
    record: &VariableRecord,
    catalog: &Catalog,
    relationships: &Relationships,
    registry: &mut DimensionRegistry,
    diagnostics: &mut Diagnostics,
) -> Option<DimensionBinding> {
    let props = &record.properties;
    if !props.has_records() {
        return None;
    }
    let length = record.data.len();

    let binding = 'resolve: {
        // The variable may itself be the dimension
        if relationships.is_dependency(&record.name)
            && (props.dim_sizes.is_empty() || props.last_rec >= 0)
        {
            let has_extra_records = !props.dim_sizes.is_empty() && props.last_rec > 0;
            let varies = props.dim_vary.iter().any(|&v| v);
            if !has_extra_records || !varies {
                break 'resolve DimensionBinding::shared(record.name.clone(), length);
            }
        }

        let explicit = [
            (format!("{}0", DEPEND_PREFIX), depend(&record.attributes, 0)),
            (DEPEND_TIME.to_string(), depend_time(&record.attributes)),
        ];
        for (key, target) in explicit {
            let Some(target) = target else {
                continue;
            };
            if let Some(binding) = record_dependency(record, &key, target, catalog, diagnostics) {
                break 'resolve binding;
            }
        }

        if let Some(existing) = registry.find_unlimited(length) {
            break 'resolve DimensionBinding::shared(existing, length);
        }

        DimensionBinding {
            name: format!("unlimited{}", registry.unlimited_dims.len()),
            size: length,
            is_shared_dependency: true,
            is_newly_minted: true,
        }
    };

    registry.bind(&binding, DimensionKind::Record);
    Some(binding)
}

/// `DEPEND_<slot>` target usable for a non-record axis of `size`.
fn axis_dependency(
    record: &VariableRecord,
    slot: usize,
    size: usize,
    catalog: &Catalog,
    diagnostics: &mut Diagnostics,
) -> Option<DimensionBinding> {
    let target = depend(&record.attributes, slot)?;

    let Some(dependency) = catalog.get(target) else {
        diagnostics.warn(
            DiagnosticKind::MissingReference,
            Some(&record.name),
            format!(
                "Variable {} listed DEPEND_{} as {}, but no variable by that name was found.",
                record.name, slot, target
            ),
        );
        return None;
    };

    if dependency.properties.dim_sizes.first() != Some(&size) {
        diagnostics.warn(
            DiagnosticKind::ShapeMismatch,
            Some(&record.name),
            format!(
                "Variable {} listed DEPEND_{} as {}, but that variable's dimensions do not match {}'s dimensions.",
                record.name, slot, target, record.name
            ),
        );
        return None;
    }

    if dependency.data.is_empty() {
        diagnostics.warn(
            DiagnosticKind::EmptyReference,
            Some(&record.name),
            format!(
                "Variable {} listed DEPEND_{} as {}, but that variable is empty.",
                record.name, slot, target
            ),
        );
        return None;
    }

    Some(DimensionBinding::shared(dependency_axis_name(dependency), size))
}

/// Resolve the names of the varying non-record axes of `record`, registering
/// each as it goes so later axes of the same variable can reuse them.
///
/// Non-varying axes are skipped and do not consume a `DEPEND_<n>` slot.
pub fn resolve_dimension_names(
    record: &VariableRecord,
    catalog: &Catalog,
    relationships: &Relationships,
    registry: &mut DimensionRegistry,
    diagnostics: &mut Diagnostics,
) -> Vec<DimensionBinding> {
    let props = &record.properties;
    let mut bindings = Vec::new();
    if props.dim_sizes.is_empty() || props.last_rec < 0 {
        return bindings;
    }

    let varying = props
        .dim_sizes
        .iter()
        .enumerate()
        .filter(|(axis, _)| props.dim_vary.get(*axis).copied().unwrap_or(true))
        .map(|(_, &size)| size);

    for (index, size) in varying.enumerate() {
        let slot = index + 1;

        let binding = if let Some(binding) =
            axis_dependency(record, slot, size, catalog, diagnostics)
        {
            binding
        } else if relationships.is_dependency(&record.name) {
            DimensionBinding::shared(dependency_axis_name(record), size)
        } else if let Some(existing) = registry.find_regular(size) {
            DimensionBinding::shared(existing, size)
        } else {
            DimensionBinding {
                name: format!("dim{}", registry.regular_dims.len()),
                size,
                is_shared_dependency: false,
                is_newly_minted: true,
            }
        };

        registry.bind(&binding, DimensionKind::Regular);
        bindings.push(binding);
    }

    bindings
}

/// All dimension names of `record`, record dimension first.
pub fn resolve_variable_dimensions(
    record: &VariableRecord,
    catalog: &Catalog,
    relationships: &Relationships,
    registry: &mut DimensionRegistry,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut dims = Vec::new();
    if let Some(binding) =
        resolve_record_dimension(record, catalog, relationships, registry, diagnostics)
    {
        dims.push(binding.name);
    }
    dims.extend(
        resolve_dimension_names(record, catalog, relationships, registry, diagnostics)
            .into_iter()
            .map(|b| b.name),
    );
    dims
}

/// Reconcile the data's rank with the resolved dimension names.
///
/// Extra singleton axes are squeezed away, one missing leading axis is added,
/// and a variable with neither dimensions nor data gets [`EMPTY_DIMENSION`].
/// If the rank still disagrees afterwards, the axes are given names private
/// to the variable and a diagnostic is recorded.
pub fn reformat_dimensions_and_data(
    name: &str,
    dims: Vec<String>,
    data: Values,
    diagnostics: &mut Diagnostics,
) -> Result<(Vec<String>, Values)> {
    let mut dims = dims;
    let mut data = data;

    if data.ndim() > dims.len() {
        data = data.squeeze()?;
    }
    if data.ndim() < dims.len() {
        data = data.expand_leading();
    }
    if data.is_empty() && dims.is_empty() {
        dims = vec![EMPTY_DIMENSION.to_string()];
    }

    if data.ndim() != dims.len() {
        diagnostics.warn(
            DiagnosticKind::ShapeMismatch,
            Some(name),
            format!(
                "Variable {} has data of shape {:?} but dimensions {:?}; using per-variable axis names.",
                name,
                data.shape(),
                dims
            ),
        );
        dims = (0..data.ndim())
            .map(|axis| format!("{}_axis{}", name, axis))
            .collect();
    }

    Ok((dims, data))
}
