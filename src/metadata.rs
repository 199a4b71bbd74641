//! Dataset inspection and variable description
//!
//! Terminal listings and JSON summaries of an assembled [`Dataset`]. Every
//! function works on the labeled result, so dimension names are the resolved
//! ones rather than whatever the input file declared.

use crate::dataset::{AssembledVariable, Dataset};
use crate::errors::{Result, RuIstpError};
use crate::types::Attributes;
use serde_json::{json, Map, Value as JsonValue};

/// Whether a variable ended up as a coordinate or as data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    Coordinate,
    Data,
}

impl VariableRole {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableRole::Coordinate => "coordinate",
            VariableRole::Data => "data",
        }
    }
}

/// Structured metadata for an assembled variable
#[derive(Debug, Clone)]
pub struct VariableMetadata {
    pub name: String,
    pub role: VariableRole,
    pub data_type: String,
    pub dimensions: Vec<DimensionInfo>,
    pub attributes: Attributes,
    pub total_elements: usize,
}

/// Information about a dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub name: String,
    pub length: usize,
    /// Named after an anonymous record axis (`unlimited<N>`)
    pub is_unlimited: bool,
}

fn is_unlimited_name(name: &str) -> bool {
    name.strip_prefix("unlimited")
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn lookup<'d>(
    dataset: &'d Dataset,
    var_name: &str,
) -> Result<(VariableRole, &'d AssembledVariable)> {
    if let Some(variable) = dataset.coordinates.get(var_name) {
        return Ok((VariableRole::Coordinate, variable));
    }
    dataset
        .data_variables
        .get(var_name)
        .map(|variable| (VariableRole::Data, variable))
        .ok_or_else(|| RuIstpError::VariableNotFound {
            var: var_name.to_string(),
        })
}

fn format_shape(shape: &[usize]) -> String {
    shape
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" × ")
}

/// Prints global attributes, coordinates and data variables of a dataset.
pub fn print_dataset(dataset: &Dataset) {
    println!("\n===== Global Attributes =====");
    for (key, attribute) in &dataset.attributes {
        println!("- {}: {}", key, attribute.value);
    }

    println!("\n===== Coordinates =====");
    for (name, variable) in &dataset.coordinates {
        println!("- {} ({})", name, variable.dims.join(", "));
    }

    println!("\n===== Data Variables =====");
    for (name, variable) in &dataset.data_variables {
        println!("- {} ({})", name, variable.dims.join(", "));
    }
}

/// Lists all dimensions and variables in a clean, organized format.
pub fn list_dimensions_and_variables(dataset: &Dataset) {
    println!("\n Dimensions");
    println!("==============");

    let dimensions = dataset.dimensions();
    if dimensions.is_empty() {
        println!("   (No dimensions found)");
    } else {
        for (name, length) in &dimensions {
            let length_info = if is_unlimited_name(name) {
                format!("{} (unlimited)", length)
            } else {
                length.to_string()
            };
            println!("    {} = {}", name, length_info);
        }
    }

    for (title, variables) in [
        ("Coordinates", &dataset.coordinates),
        ("Data Variables", &dataset.data_variables),
    ] {
        println!("\n {}", title);
        println!("={}", "=".repeat(title.len() + 1));

        if variables.is_empty() {
            println!("   (None)");
            continue;
        }
        for (name, variable) in variables {
            println!(
                "    {} ({}): [{}] = ({})",
                name,
                variable.data.kind_name(),
                variable.dims.join(", "),
                format_shape(variable.shape())
            );

            let key_attrs: Vec<String> = ["units", "long_name", "FILLVAL"]
                .iter()
                .filter_map(|key| {
                    variable
                        .attributes
                        .get(*key)
                        .map(|attribute| format!("{}: {}", key, attribute.value))
                })
                .collect();
            if !key_attrs.is_empty() {
                println!("      └─ {}", key_attrs.join(", "));
            }
        }
    }

    println!("\n💡 Tip: Use --describe <variable> to show every attribute of a variable");
}

/// Describes a specific variable showing its role, dimensions and all attributes.
pub fn describe_variable(dataset: &Dataset, var_name: &str) -> Result<()> {
    let (role, variable) = lookup(dataset, var_name)?;

    println!("\n Variable Description: {}", var_name);
    println!("={}", "=".repeat(var_name.len() + 25));

    println!(" Role: {}", role.as_str());
    println!(" Data type: {}", variable.data.kind_name());
    println!(" Dimensions: [{}]", variable.dims.join(", "));
    println!(" Shape: ({})", format_shape(variable.shape()));

    if variable.attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (key, attribute) in &variable.attributes {
            println!("   • {} ({}): {}", key, attribute.data_type, attribute.value);
        }
    }

    let findings: Vec<_> = dataset.diagnostics.for_variable(var_name).collect();
    if !findings.is_empty() {
        println!("\n  Diagnostics:");
        for diagnostic in findings {
            println!("   ⚠ {}", diagnostic);
        }
    }

    println!("\n Total elements: {}", variable.size());
    Ok(())
}

/// Get structured metadata for a variable
pub fn get_variable_metadata(dataset: &Dataset, var_name: &str) -> Result<VariableMetadata> {
    let (role, variable) = lookup(dataset, var_name)?;

    let dimensions = variable
        .dims
        .iter()
        .zip(variable.shape())
        .map(|(name, &length)| DimensionInfo {
            name: name.clone(),
            length,
            is_unlimited: is_unlimited_name(name),
        })
        .collect();

    Ok(VariableMetadata {
        name: var_name.to_string(),
        role,
        data_type: variable.data.kind_name().to_string(),
        dimensions,
        attributes: variable.attributes.clone(),
        total_elements: variable.size(),
    })
}

fn attributes_json(attributes: &Attributes) -> JsonValue {
    let map: Map<String, JsonValue> = attributes
        .iter()
        .map(|(key, attribute)| (key.clone(), attribute.value.to_json()))
        .collect();
    JsonValue::Object(map)
}

fn variables_json<'d>(
    variables: impl Iterator<Item = (&'d String, &'d AssembledVariable)>,
) -> JsonValue {
    let map: Map<String, JsonValue> = variables
        .map(|(name, variable)| {
            (
                name.clone(),
                json!({
                    "dims": variable.dims,
                    "shape": variable.shape(),
                    "dtype": variable.data.kind_name(),
                    "attrs": attributes_json(&variable.attributes),
                }),
            )
        })
        .collect();
    JsonValue::Object(map)
}

/// Machine-readable summary of the dataset structure (no data values).
pub fn dataset_summary_json(dataset: &Dataset) -> JsonValue {
    let diagnostics: Vec<JsonValue> = dataset
        .diagnostics
        .iter()
        .map(|d| {
            json!({
                "kind": d.kind.as_str(),
                "variable": d.variable,
                "message": d.message,
            })
        })
        .collect();

    json!({
        "dims": dataset.dimensions(),
        "coords": variables_json(dataset.coordinates.iter()),
        "data_vars": variables_json(dataset.data_variables.iter()),
        "attrs": attributes_json(&dataset.attributes),
        "diagnostics": diagnostics,
    })
}
