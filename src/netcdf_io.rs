//! NetCDF I/O: a catalog backend reading ISTP-annotated netCDF files and a
//! writer exporting an assembled dataset
//!
//! NetCDF has no record/dimension-variance model of its own, so the source
//! maps it onto the CDF one: a leading unlimited dimension is the record
//! axis, every other dimension is a varying declared dimension. The original
//! CDF type can be carried in a `CDF_DATA_TYPE` text attribute; without it the
//! netCDF storage type decides.

use crate::catalog::CatalogSource;
use crate::dataset::{AssembledVariable, Dataset};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::errors::{Result, RuIstpError};
use crate::types::{Attribute, Attributes, DataType, Values, VariableProperties};
use chrono::Utc;
use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::{create, AttributeValue, File, Variable};
use std::collections::BTreeMap;
use std::{fs, path::Path};

/// Attribute carrying the original CDF data type of a netCDF variable
pub const CDF_DATA_TYPE_ATTRIBUTE: &str = "CDF_DATA_TYPE";

/// Attributes that share their variable's data type in CDF
const TYPED_LIKE_VARIABLE: [&str; 5] = ["FILLVAL", "VALIDMIN", "VALIDMAX", "SCALEMIN", "SCALEMAX"];

/// Convert a netCDF attribute value into a CDF-typed attribute.
fn attribute_from_netcdf(value: AttributeValue) -> Option<Attribute> {
    let attribute = match value {
        AttributeValue::Str(s) => Attribute::text(s),
        AttributeValue::Strs(ss) => Attribute::new(DataType::Char, Values::texts(ss)),
        AttributeValue::Double(d) => Attribute::double(d),
        AttributeValue::Doubles(ds) => Attribute::new(DataType::Double, Values::floats(ds)),
        AttributeValue::Float(f) => {
            Attribute::new(DataType::Float, Values::floats(vec![f64::from(f)]))
        }
        AttributeValue::Floats(fs) => Attribute::new(
            DataType::Float,
            Values::floats(fs.into_iter().map(f64::from).collect()),
        ),
        AttributeValue::Longlong(i) => Attribute::new(DataType::Int8, Values::ints(vec![i])),
        AttributeValue::Longlongs(is) => Attribute::new(DataType::Int8, Values::ints(is)),
        AttributeValue::Int(i) => Attribute::new(DataType::Int4, Values::ints(vec![i64::from(i)])),
        AttributeValue::Ints(is) => Attribute::new(
            DataType::Int4,
            Values::ints(is.into_iter().map(i64::from).collect()),
        ),
        AttributeValue::Uint(u) => {
            Attribute::new(DataType::UInt4, Values::ints(vec![i64::from(u)]))
        }
        AttributeValue::Uints(us) => Attribute::new(
            DataType::UInt4,
            Values::ints(us.into_iter().map(i64::from).collect()),
        ),
        AttributeValue::Short(s) => {
            Attribute::new(DataType::Int2, Values::ints(vec![i64::from(s)]))
        }
        AttributeValue::Shorts(ss) => Attribute::new(
            DataType::Int2,
            Values::ints(ss.into_iter().map(i64::from).collect()),
        ),
        AttributeValue::Ushort(u) => {
            Attribute::new(DataType::UInt2, Values::ints(vec![i64::from(u)]))
        }
        AttributeValue::Ushorts(us) => Attribute::new(
            DataType::UInt2,
            Values::ints(us.into_iter().map(i64::from).collect()),
        ),
        AttributeValue::Schar(c) => {
            Attribute::new(DataType::Int1, Values::ints(vec![i64::from(c)]))
        }
        AttributeValue::Schars(cs) => Attribute::new(
            DataType::Int1,
            Values::ints(cs.into_iter().map(i64::from).collect()),
        ),
        AttributeValue::Uchar(u) => {
            Attribute::new(DataType::UInt1, Values::ints(vec![i64::from(u)]))
        }
        AttributeValue::Uchars(us) => Attribute::new(
            DataType::UInt1,
            Values::ints(us.into_iter().map(i64::from).collect()),
        ),
        _ => return None,
    };
    Some(attribute)
}

fn attributes_from_netcdf<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> Attributes {
    let mut attributes = Attributes::new();
    for attr in attrs {
        match attr.value() {
            Ok(value) => match attribute_from_netcdf(value) {
                Some(attribute) => {
                    attributes.insert(attr.name().to_string(), attribute);
                }
                None => {
                    tracing::debug!(attribute = attr.name(), "skipped unsupported attribute type")
                }
            },
            Err(e) => tracing::debug!(attribute = attr.name(), "unreadable attribute: {}", e),
        }
    }
    attributes
}

/// Map a netCDF storage type onto the closest CDF type.
fn data_type_from_storage(var: &Variable) -> DataType {
    match var.vartype() {
        NcVariableType::Char | NcVariableType::String => DataType::Char,
        NcVariableType::Float(FloatType::F64) => DataType::Double,
        NcVariableType::Float(FloatType::F32) => DataType::Float,
        NcVariableType::Int(IntType::I8) => DataType::Int1,
        NcVariableType::Int(IntType::U8) => DataType::UInt1,
        NcVariableType::Int(IntType::I16) => DataType::Int2,
        NcVariableType::Int(IntType::U16) => DataType::UInt2,
        NcVariableType::Int(IntType::I32) => DataType::Int4,
        NcVariableType::Int(IntType::U32) => DataType::UInt4,
        // CDF has no unsigned 64-bit type
        NcVariableType::Int(IntType::I64 | IntType::U64) => DataType::Int8,
        _ => DataType::Double,
    }
}

/// NetCDF file exposed through the [`CatalogSource`] contract
pub struct NetCDFSource {
    file: File,
}

impl NetCDFSource {
    /// Open a netCDF file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = netcdf::open(path.as_ref())?;
        tracing::info!("opened netCDF file {}", path.as_ref().display());
        Ok(Self { file })
    }

    fn variable(&self, name: &str) -> Result<Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| RuIstpError::VariableNotFound {
                var: name.to_string(),
            })
    }

    fn data_type(var: &Variable) -> DataType {
        var.attribute(CDF_DATA_TYPE_ATTRIBUTE)
            .and_then(|attr| match attr.value().ok()? {
                AttributeValue::Str(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or_else(|| data_type_from_storage(var))
    }
}

impl CatalogSource for NetCDFSource {
    fn list_variables(&self) -> Result<Vec<String>> {
        Ok(self
            .file
            .variables()
            .map(|var| var.name().to_string())
            .collect())
    }

    fn get_variable_attributes(&self, name: &str) -> Result<Attributes> {
        let var = self.variable(name)?;
        let data_type = Self::data_type(&var);
        let mut attributes = attributes_from_netcdf(var.attributes());

        for key in TYPED_LIKE_VARIABLE {
            if let Some(attribute) = attributes.get_mut(key) {
                if data_type.is_time() {
                    attribute.data_type = data_type;
                }
            }
        }
        Ok(attributes)
    }

    fn get_variable_properties(&self, name: &str) -> Result<VariableProperties> {
        let var = self.variable(name)?;
        let dims = var.dimensions();
        let rec_vary = dims.first().map_or(false, |d| d.is_unlimited());

        let declared = if rec_vary { &dims[1..] } else { dims };
        let dim_sizes: Vec<usize> = declared.iter().map(|d| d.len()).collect();
        let last_rec = if rec_vary {
            dims[0].len() as i64 - 1
        } else {
            0
        };

        Ok(VariableProperties {
            data_type: Self::data_type(&var),
            dim_vary: vec![true; dim_sizes.len()],
            dim_sizes,
            rec_vary,
            last_rec,
        })
    }

    fn get_variable_data(&self, name: &str) -> Result<Values> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let data_type = Self::data_type(&var);

        if shape.iter().product::<usize>() == 0 {
            return Ok(Values::empty());
        }

        let values = match data_type {
            DataType::Char | DataType::UChar => {
                return Err(RuIstpError::SourceError {
                    var: name.to_string(),
                    message: "text variables are not read from netCDF".to_string(),
                })
            }
            DataType::Epoch16 => {
                let Some((2, outer)) = shape.split_last() else {
                    return Err(RuIstpError::SourceError {
                        var: name.to_string(),
                        message: "CDF_EPOCH16 data needs a trailing axis of length 2".to_string(),
                    });
                };
                let flat: Vec<f64> = var.get_values::<f64, _>(..)?;
                let pairs: Vec<[f64; 2]> = flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
                Values::Epoch16(ArrayD::from_shape_vec(IxDyn(outer), pairs)?)
            }
            DataType::Float
            | DataType::Real4
            | DataType::Double
            | DataType::Real8
            | DataType::Epoch => {
                let flat: Vec<f64> = var.get_values::<f64, _>(..)?;
                Values::Float(ArrayD::from_shape_vec(IxDyn(&shape), flat)?)
            }
            _ => {
                let flat: Vec<i64> = var.get_values::<i64, _>(..)?;
                Values::Int(ArrayD::from_shape_vec(IxDyn(&shape), flat)?)
            }
        };
        Ok(values)
    }

    fn get_global_attributes(&self) -> Result<Attributes> {
        Ok(attributes_from_netcdf(self.file.attributes()))
    }
}

/// Writer exporting an assembled [`Dataset`] to a new netCDF file
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Dimension lengths for every exportable variable; variables that would
    /// redefine a dimension with another length are reported and left out.
    fn plan_dimensions<'d>(
        dataset: &'d Dataset,
        diagnostics: &mut Diagnostics,
    ) -> (BTreeMap<String, usize>, Vec<(&'d String, &'d AssembledVariable)>) {
        let mut dims: BTreeMap<String, usize> = BTreeMap::new();
        let mut accepted = Vec::new();

        for (name, variable) in dataset.variables() {
            if variable.data.is_empty() {
                diagnostics.warn(
                    DiagnosticKind::ExportSkipped,
                    Some(name),
                    format!("Skipped empty variable '{}'", name),
                );
                continue;
            }
            if matches!(variable.data, Values::Text(_) | Values::Epoch16(_)) {
                diagnostics.warn(
                    DiagnosticKind::ExportSkipped,
                    Some(name),
                    format!(
                        "Skipped variable '{}' with unsupported {} data",
                        name,
                        variable.data.kind_name()
                    ),
                );
                continue;
            }

            let conflict = variable
                .dims
                .iter()
                .zip(variable.shape())
                .find(|(dim, len)| dims.get(dim.as_str()).map_or(false, |known| known != *len));
            if let Some((dim, len)) = conflict {
                diagnostics.warn(
                    DiagnosticKind::ExportSkipped,
                    Some(name),
                    format!(
                        "Skipped variable '{}': dimension '{}' has length {} here but {} elsewhere",
                        name, dim, len, dims[dim.as_str()]
                    ),
                );
                continue;
            }

            for (dim, &len) in variable.dims.iter().zip(variable.shape()) {
                dims.insert(dim.clone(), len);
            }
            accepted.push((name, variable));
        }

        (dims, accepted)
    }

    /// Write every exportable variable and the global attributes.
    pub fn write_dataset(&self, dataset: &Dataset) -> Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;
        let (dims, variables) = Self::plan_dimensions(dataset, &mut diagnostics);

        for (dim_name, &dim_len) in &dims {
            file.add_dimension(dim_name, dim_len)?;
        }

        for (name, variable) in variables {
            let dim_refs: Vec<&str> = variable.dims.iter().map(|s| s.as_str()).collect();
            let mut new_var = match &variable.data {
                Values::Float(data) => {
                    let mut new_var = file.add_variable::<f64>(name, &dim_refs)?;
                    new_var.put(data.view(), ..)?;
                    new_var
                }
                Values::Int(data) => {
                    let mut new_var = file.add_variable::<i64>(name, &dim_refs)?;
                    new_var.put(data.view(), ..)?;
                    new_var
                }
                Values::DateTime(data) => {
                    let seconds = data.mapv(|t| {
                        t.map(|t| t.timestamp_micros() as f64 / 1.0e6)
                            .unwrap_or(f64::NAN)
                    });
                    let mut new_var = file.add_variable::<f64>(name, &dim_refs)?;
                    new_var.put(seconds.view(), ..)?;
                    new_var.put_attribute("calendar_units", "seconds since 1970-01-01T00:00:00Z")?;
                    new_var
                }
                Values::Text(_) | Values::Epoch16(_) => continue,
            };

            // Written arrays are native netCDF types, the CDF type no longer applies
            for (key, attribute) in variable
                .attributes
                .iter()
                .filter(|(key, _)| key.as_str() != CDF_DATA_TYPE_ATTRIBUTE)
            {
                match attribute_to_netcdf(&attribute.value) {
                    Some(value) => {
                        new_var.put_attribute(key, value)?;
                    }
                    None => {
                        tracing::debug!(
                            variable = name.as_str(),
                            attribute = key.as_str(),
                            "skipped attribute"
                        );
                    }
                }
            }
        }

        for (key, attribute) in &dataset.attributes {
            if let Some(value) = attribute_to_netcdf(&attribute.value) {
                file.add_attribute(key, value)?;
            }
        }

        // Add history attribute
        file.add_attribute(
            "history",
            format!("Created by ru_istp on {}", Utc::now().to_rfc3339()),
        )?;

        tracing::info!(
            "wrote {} variables to {}",
            dataset.len().saturating_sub(diagnostics.len()),
            self.output_path.display()
        );
        Ok(diagnostics)
    }
}

/// NetCDF attribute value for an attribute entry; empty values are skipped.
fn attribute_to_netcdf(value: &Values) -> Option<AttributeValue> {
    if value.is_empty() {
        return None;
    }
    let converted = match value {
        Values::Text(a) if a.len() == 1 => AttributeValue::Str(a.iter().next()?.clone()),
        Values::Text(a) => AttributeValue::Strs(a.iter().cloned().collect()),
        Values::Float(a) if a.len() == 1 => AttributeValue::Double(*a.iter().next()?),
        Values::Float(a) => AttributeValue::Doubles(a.iter().copied().collect()),
        Values::Int(a) if a.len() == 1 => AttributeValue::Longlong(*a.iter().next()?),
        Values::Int(a) => AttributeValue::Longlongs(a.iter().copied().collect()),
        Values::DateTime(a) => AttributeValue::Strs(
            a.iter()
                .map(|t| t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "NaT".to_string()))
                .collect(),
        ),
        Values::Epoch16(a) => {
            AttributeValue::Doubles(a.iter().flat_map(|p| [p[0], p[1]]).collect())
        }
    };
    Some(converted)
}
