//! Core value types shared by every stage of the conversion
//!
//! A CDF variable is a typed n-dimensional array plus a bag of attributes.
//! [`Values`] carries the array in one of a few element representations,
//! [`DataType`] remembers what the file declared, and [`VariableRecord`]
//! bundles both with the record/shape properties the file reports.

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, RuIstpError};

/// Declared CDF data type of a variable or attribute entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte,
    Int1,
    Int2,
    Int4,
    Int8,
    UInt1,
    UInt2,
    UInt4,
    Real4,
    Real8,
    Float,
    Double,
    Epoch,
    Epoch16,
    TimeTt2000,
    Char,
    UChar,
}

impl DataType {
    /// The `Data_Type_Description` string the CDF library reports
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Byte => "CDF_BYTE",
            Self::Int1 => "CDF_INT1",
            Self::Int2 => "CDF_INT2",
            Self::Int4 => "CDF_INT4",
            Self::Int8 => "CDF_INT8",
            Self::UInt1 => "CDF_UINT1",
            Self::UInt2 => "CDF_UINT2",
            Self::UInt4 => "CDF_UINT4",
            Self::Real4 => "CDF_REAL4",
            Self::Real8 => "CDF_REAL8",
            Self::Float => "CDF_FLOAT",
            Self::Double => "CDF_DOUBLE",
            Self::Epoch => "CDF_EPOCH",
            Self::Epoch16 => "CDF_EPOCH16",
            Self::TimeTt2000 => "CDF_TIME_TT2000",
            Self::Char => "CDF_CHAR",
            Self::UChar => "CDF_UCHAR",
        }
    }

    /// One of the three CDF time representations
    #[must_use]
    pub const fn is_time(self) -> bool {
        matches!(self, Self::Epoch | Self::Epoch16 | Self::TimeTt2000)
    }

    /// Types whose fill values are replaced by missing values
    #[must_use]
    pub const fn is_floating_or_time(self) -> bool {
        matches!(
            self,
            Self::Float | Self::Real4 | Self::Double | Self::Real8
        ) || self.is_time()
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Char | Self::UChar)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for DataType {
    type Err = RuIstpError;

    fn from_str(s: &str) -> Result<Self> {
        let data_type = match s.trim() {
            "CDF_BYTE" => Self::Byte,
            "CDF_INT1" => Self::Int1,
            "CDF_INT2" => Self::Int2,
            "CDF_INT4" => Self::Int4,
            "CDF_INT8" => Self::Int8,
            "CDF_UINT1" => Self::UInt1,
            "CDF_UINT2" => Self::UInt2,
            "CDF_UINT4" => Self::UInt4,
            "CDF_REAL4" => Self::Real4,
            "CDF_REAL8" => Self::Real8,
            "CDF_FLOAT" => Self::Float,
            "CDF_DOUBLE" => Self::Double,
            "CDF_EPOCH" => Self::Epoch,
            "CDF_EPOCH16" => Self::Epoch16,
            "CDF_TIME_TT2000" => Self::TimeTt2000,
            "CDF_CHAR" => Self::Char,
            "CDF_UCHAR" => Self::UChar,
            other => {
                return Err(RuIstpError::Generic(format!(
                    "Unknown CDF data type '{}'",
                    other
                )))
            }
        };
        Ok(data_type)
    }
}

/// Typed n-dimensional payload of a variable or attribute entry
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Text(ArrayD<String>),
    /// `CDF_EPOCH16` pairs of (seconds since year 0, picoseconds)
    Epoch16(ArrayD<[f64; 2]>),
    /// Calendar times; `None` marks a missing time
    DateTime(ArrayD<Option<DateTime<Utc>>>),
}

/// Apply the same generic expression to whichever array a [`Values`] holds.
macro_rules! with_array {
    ($values:expr, $arr:ident => $body:expr) => {
        match $values {
            Values::Float($arr) => $body,
            Values::Int($arr) => $body,
            Values::Text($arr) => $body,
            Values::Epoch16($arr) => $body,
            Values::DateTime($arr) => $body,
        }
    };
}

/// Like [`with_array!`] but rewraps the resulting array in the same variant.
macro_rules! map_array {
    ($values:expr, $arr:ident => $body:expr) => {
        match $values {
            Values::Float($arr) => Values::Float($body),
            Values::Int($arr) => Values::Int($body),
            Values::Text($arr) => Values::Text($body),
            Values::Epoch16($arr) => Values::Epoch16($body),
            Values::DateTime($arr) => Values::DateTime($body),
        }
    };
}

fn reshape_vec<A: Clone>(array: &ArrayD<A>, shape: &[usize]) -> Result<ArrayD<A>> {
    Ok(ArrayD::from_shape_vec(
        IxDyn(shape),
        array.iter().cloned().collect(),
    )?)
}

impl Values {
    /// An empty one-dimensional array, used for variables without records
    pub fn empty() -> Self {
        Values::Float(ArrayD::zeros(IxDyn(&[0])))
    }

    pub fn floats(values: Vec<f64>) -> Self {
        Values::Float(Array1::from(values).into_dyn())
    }

    pub fn ints(values: Vec<i64>) -> Self {
        Values::Int(Array1::from(values).into_dyn())
    }

    /// A single text entry, the usual shape of pointer attributes like `DEPEND_0`
    pub fn text(value: impl Into<String>) -> Self {
        Values::Text(ArrayD::from_elem(IxDyn(&[1]), value.into()))
    }

    pub fn texts<S: Into<String>>(values: Vec<S>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Values::Text(Array1::from(values).into_dyn())
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    /// Total number of elements
    pub fn size(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Length along the leading axis; a 0-d value counts as one element.
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    /// Lift a 0-d value into a one-element 1-d array.
    pub fn into_at_least_1d(self) -> Self {
        if self.ndim() == 0 {
            map_array!(self, a => a.insert_axis(Axis(0)))
        } else {
            self
        }
    }

    /// Drop every axis of length one.
    pub fn squeeze(&self) -> Result<Self> {
        let shape: Vec<usize> = self.shape().iter().copied().filter(|&n| n != 1).collect();
        Ok(map_array!(self, a => reshape_vec(a, &shape)?))
    }

    /// Add a new leading axis of length one.
    pub fn expand_leading(self) -> Self {
        map_array!(self, a => a.insert_axis(Axis(0)))
    }

    /// Reshape keeping the logical element order.
    pub fn reshaped(&self, shape: &[usize]) -> Result<Self> {
        Ok(map_array!(self, a => reshape_vec(a, shape)?))
    }

    /// First text element, the way pointer attributes are read.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Values::Text(a) => a.iter().next().map(String::as_str),
            _ => None,
        }
    }

    /// Element-wise view as `f64`, for numeric comparisons.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Values::Float(a) => Some(a.iter().copied().collect()),
            Values::Int(a) => Some(a.iter().map(|&v| v as f64).collect()),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Values::Float(_) => "float64",
            Values::Int(_) => "int64",
            Values::Text(_) => "string",
            Values::Epoch16(_) => "epoch16",
            Values::DateTime(_) => "datetime64",
        }
    }

    /// JSON rendering used by dataset summaries
    pub fn to_json(&self) -> JsonValue {
        let items: Vec<JsonValue> = match self {
            Values::Float(a) => a
                .iter()
                .map(|v| if v.is_finite() { json!(v) } else { JsonValue::Null })
                .collect(),
            Values::Int(a) => a.iter().map(|v| json!(v)).collect(),
            Values::Text(a) => a.iter().map(|v| json!(v)).collect(),
            Values::Epoch16(a) => a.iter().map(|v| json!([v[0], v[1]])).collect(),
            Values::DateTime(a) => a
                .iter()
                .map(|v| match v {
                    Some(t) => json!(t.to_rfc3339()),
                    None => JsonValue::Null,
                })
                .collect(),
        };
        if items.len() == 1 {
            items.into_iter().next().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Array(items)
        }
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Values::Text(a) if a.len() == 1 => {
                write!(f, "\"{}\"", a.iter().next().map(String::as_str).unwrap_or(""))
            }
            _ => write!(f, "{}", self.to_json()),
        }
    }
}

/// One attribute entry: its declared type and its value
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub data_type: DataType,
    pub value: Values,
}

impl Attribute {
    pub fn new(data_type: DataType, value: Values) -> Self {
        Self { data_type, value }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(DataType::Char, Values::text(value))
    }

    pub fn double(value: f64) -> Self {
        Self::new(DataType::Double, Values::floats(vec![value]))
    }

    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }
}

/// Attribute name to entry mapping, kept sorted for deterministic output
pub type Attributes = BTreeMap<String, Attribute>;

/// Shape and record properties the file reports for a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableProperties {
    pub data_type: DataType,
    /// Declared non-record dimension sizes
    pub dim_sizes: Vec<usize>,
    /// Whether each declared dimension varies
    pub dim_vary: Vec<bool>,
    /// Whether the variable varies by record
    pub rec_vary: bool,
    /// Index of the last written record; negative when nothing was written
    pub last_rec: i64,
}

impl VariableProperties {
    /// A record-varying variable with `records` records and the given extra dimensions
    pub fn record_varying(data_type: DataType, records: usize, dim_sizes: Vec<usize>) -> Self {
        let dim_vary = vec![true; dim_sizes.len()];
        Self {
            data_type,
            dim_sizes,
            dim_vary,
            rec_vary: true,
            last_rec: records as i64 - 1,
        }
    }

    /// A non-record variable with the given dimensions
    pub fn non_record(data_type: DataType, dim_sizes: Vec<usize>) -> Self {
        let dim_vary = vec![true; dim_sizes.len()];
        Self {
            data_type,
            dim_sizes,
            dim_vary,
            rec_vary: false,
            last_rec: 0,
        }
    }

    /// Varies by record and the last record index is not zero
    pub fn has_records(&self) -> bool {
        self.rec_vary && self.last_rec != 0
    }
}

/// Everything known about one variable of the file
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord {
    pub name: String,
    pub data: Values,
    pub attributes: Attributes,
    pub properties: VariableProperties,
}

impl VariableRecord {
    pub fn new(name: impl Into<String>, data: Values, properties: VariableProperties) -> Self {
        Self {
            name: name.into(),
            data,
            attributes: Attributes::new(),
            properties,
        }
    }

    /// Builder-style attribute insertion
    pub fn with_attribute(mut self, key: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(key.into(), attribute);
        self
    }

    /// Builder-style insertion of a text attribute such as `DEPEND_0`
    pub fn with_text(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_attribute(key, Attribute::text(value))
    }

    pub fn attribute_text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Attribute::as_text)
    }
}
