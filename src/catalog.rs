//! Catalog adapter: a read-only, fully materialized view of a file's variables
//!
//! The low-level reader is abstracted behind [`CatalogSource`]. A [`Catalog`]
//! is built once per conversion, normalizing every variable's time values on
//! the way in, and is then shared read-only by relationship discovery,
//! dimension resolution and assembly.

use std::collections::HashMap;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::errors::{Result, RuIstpError};
use crate::normalize::{convert_time_types, TimeMode};
use crate::types::{Attribute, Attributes, Values, VariableProperties, VariableRecord};

/// Low-level access to a self-describing data file
pub trait CatalogSource {
    /// Names of every variable in file order
    fn list_variables(&self) -> Result<Vec<String>>;

    fn get_variable_attributes(&self, name: &str) -> Result<Attributes>;

    fn get_variable_properties(&self, name: &str) -> Result<VariableProperties>;

    fn get_variable_data(&self, name: &str) -> Result<Values>;

    /// Whole-file attributes; failures are tolerated by the catalog
    fn get_global_attributes(&self) -> Result<Attributes>;
}

/// All variables of one file, in file order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<VariableRecord>,
    index: HashMap<String, usize>,
    global_attributes: Attributes,
}

impl Catalog {
    /// Build a catalog from already-read records, without any normalization.
    pub fn from_records(records: Vec<VariableRecord>, global_attributes: Attributes) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self {
            records,
            index,
            global_attributes,
        }
    }

    /// Read every variable from `source` and normalize its time values.
    ///
    /// Variables whose last record index is negative are declared but empty and
    /// get an empty array without touching the data. A variable whose data
    /// cannot be read degrades to an empty array with a diagnostic; only
    /// failures listing or describing variables are propagated.
    pub fn from_source<S: CatalogSource + ?Sized>(
        source: &S,
        mode: TimeMode,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut records = Vec::new();

        for name in source.list_variables()? {
            let attributes = source.get_variable_attributes(&name)?;
            let properties = source.get_variable_properties(&name)?;

            let data = if properties.last_rec < 0 {
                Values::empty()
            } else {
                match source.get_variable_data(&name) {
                    Ok(data) => data,
                    Err(e) => {
                        diagnostics.warn(
                            DiagnosticKind::UnreadableValue,
                            Some(&name),
                            format!("Could not read data of variable {}: {}", name, e),
                        );
                        Values::empty()
                    }
                }
            };

            let (data, attributes) = convert_time_types(data, attributes, &properties, mode);
            records.push(VariableRecord {
                name,
                data,
                attributes,
                properties,
            });
        }

        let global_attributes = source.get_global_attributes().unwrap_or_else(|e| {
            tracing::info!("no global attributes available: {}", e);
            Attributes::new()
        });

        Ok(Self::from_records(records, global_attributes))
    }

    pub fn get(&self, name: &str) -> Option<&VariableRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Records in file order
    pub fn iter(&self) -> impl Iterator<Item = &VariableRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn global_attributes(&self) -> &Attributes {
        &self.global_attributes
    }
}

/// In-memory [`CatalogSource`], handy for tests and for callers that already
/// decoded a file with some other reader
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<VariableRecord>,
    global_attributes: Option<Attributes>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            global_attributes: Some(Attributes::new()),
        }
    }

    pub fn with_variable(mut self, record: VariableRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_global_attribute(mut self, key: impl Into<String>, attribute: Attribute) -> Self {
        self.global_attributes
            .get_or_insert_with(Attributes::new)
            .insert(key.into(), attribute);
        self
    }

    /// Make global attribute retrieval fail, as some files do.
    pub fn without_global_attributes(mut self) -> Self {
        self.global_attributes = None;
        self
    }

    fn record(&self, name: &str) -> Result<&VariableRecord> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RuIstpError::VariableNotFound {
                var: name.to_string(),
            })
    }
}

impl CatalogSource for MemorySource {
    fn list_variables(&self) -> Result<Vec<String>> {
        Ok(self.records.iter().map(|r| r.name.clone()).collect())
    }

    fn get_variable_attributes(&self, name: &str) -> Result<Attributes> {
        Ok(self.record(name)?.attributes.clone())
    }

    fn get_variable_properties(&self, name: &str) -> Result<VariableProperties> {
        Ok(self.record(name)?.properties.clone())
    }

    fn get_variable_data(&self, name: &str) -> Result<Values> {
        Ok(self.record(name)?.data.clone())
    }

    fn get_global_attributes(&self) -> Result<Attributes> {
        self.global_attributes
            .clone()
            .ok_or_else(|| RuIstpError::Generic("file has no global attributes".to_string()))
    }
}
