//! Value normalization: CDF time conversion and fill-value substitution
//!
//! Both transforms act identically on variable data and on attribute values,
//! and only ever touch values whose declared type is one of the CDF time types
//! (time conversion) or a floating/time type (fill substitution).

use ndarray::ArrayD;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::epochs::{epoch16_narrow, epoch_to_calendar, epoch_to_unixtime};
use crate::types::{Attribute, Attributes, DataType, Values, VariableProperties};

/// Units written over `UNITS` after a calendar conversion
pub const CALENDAR_UNITS: &str = "Datetime (UTC)";
/// Units written over `UNITS` after a Unix time conversion
pub const UNIX_UNITS: &str = "seconds";

/// How CDF time values are presented in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    /// Keep epochs, except that `CDF_EPOCH16` is narrowed to `CDF_EPOCH`
    #[default]
    None,
    /// UTC calendar times
    Calendar,
    /// Seconds since 1970-01-01T00:00:00Z
    Unix,
}

impl TimeMode {
    /// Pick the mode from the two user flags; asking for both yields Unix time.
    pub fn from_flags(to_datetime: bool, to_unixtime: bool, diagnostics: &mut Diagnostics) -> Self {
        match (to_datetime, to_unixtime) {
            (true, true) => {
                diagnostics.warn(
                    DiagnosticKind::ConflictingTimeConversion,
                    None,
                    "Cannot convert to both unixtime and datetime. Continuing with conversion to unixtime.",
                );
                TimeMode::Unix
            }
            (false, true) => TimeMode::Unix,
            (true, false) => TimeMode::Calendar,
            (false, false) => TimeMode::None,
        }
    }

    #[must_use]
    pub const fn units(self) -> Option<&'static str> {
        match self {
            TimeMode::None => None,
            TimeMode::Calendar => Some(CALENDAR_UNITS),
            TimeMode::Unix => Some(UNIX_UNITS),
        }
    }
}

/// Convert one value array of `data_type` according to `mode`.
///
/// Empty values and non-time types come back unchanged.
pub fn convert_time_values(values: Values, data_type: DataType, mode: TimeMode) -> Values {
    if values.is_empty() || !data_type.is_time() {
        return values;
    }
    match mode {
        TimeMode::Calendar => epoch_to_calendar(&values, data_type),
        TimeMode::Unix => epoch_to_unixtime(&values, data_type),
        TimeMode::None if data_type == DataType::Epoch16 => epoch16_narrow(&values),
        TimeMode::None => values,
    }
}

/// Normalize a variable's data and attributes.
///
/// Scalars are lifted to one-element arrays. When the data itself is
/// converted, an existing `UNITS` attribute is rewritten to the new unit.
/// Every attribute is converted on its own declared type, independently of
/// what happened to the data.
pub fn convert_time_types(
    data: Values,
    attributes: Attributes,
    properties: &VariableProperties,
    mode: TimeMode,
) -> (Values, Attributes) {
    let data = data.into_at_least_1d();
    let data_is_time = !data.is_empty() && properties.data_type.is_time();
    let new_data = convert_time_values(data, properties.data_type, mode);

    let mut attributes = attributes;
    if data_is_time {
        if let (Some(units), Some(existing)) = (mode.units(), attributes.get_mut("UNITS")) {
            *existing = Attribute::text(units);
        }
    }

    let new_attributes = attributes
        .into_iter()
        .map(|(key, attribute)| {
            let value = convert_time_values(
                attribute.value.into_at_least_1d(),
                attribute.data_type,
                mode,
            );
            (
                key,
                Attribute {
                    data_type: attribute.data_type,
                    value,
                },
            )
        })
        .collect();

    (new_data, new_attributes)
}

fn replace_float_fill(array: &ArrayD<f64>, fill: f64) -> ArrayD<f64> {
    array.mapv(|v| if v == fill { f64::NAN } else { v })
}

/// Replace elements equal to the declared `FILLVAL` with missing values.
///
/// Only floating point and time variables are touched. Integer TT2000 data is
/// compared exactly and promoted to floats so that it can hold NaN; calendar
/// times use `None`.
pub fn fill_to_missing(
    data: Values,
    attributes: &Attributes,
    properties: &VariableProperties,
) -> Values {
    if !properties.data_type.is_floating_or_time() {
        return data;
    }
    let Some(fill) = attributes.get("FILLVAL") else {
        return data;
    };

    match data {
        Values::DateTime(array) => match &fill.value {
            Values::DateTime(fill_values) => match fill_values.iter().next() {
                Some(&fill_time) => {
                    Values::DateTime(array.mapv(|v| if v == fill_time { None } else { v }))
                }
                None => Values::DateTime(array),
            },
            _ => Values::DateTime(array),
        },
        Values::Float(array) => match fill.value.to_f64_vec().and_then(|f| f.first().copied()) {
            Some(fill_value) => Values::Float(replace_float_fill(&array, fill_value)),
            None => Values::Float(array),
        },
        Values::Int(array) => match &fill.value {
            Values::Int(fill_values) => match fill_values.iter().next() {
                Some(&fill_value) if array.iter().any(|&v| v == fill_value) => Values::Float(
                    array.mapv(|v| if v == fill_value { f64::NAN } else { v as f64 }),
                ),
                _ => Values::Int(array),
            },
            Values::Float(fill_values) => match fill_values.iter().next() {
                Some(&fill_value) if array.iter().any(|&v| v as f64 == fill_value) => {
                    Values::Float(replace_float_fill(&array.mapv(|v| v as f64), fill_value))
                }
                _ => Values::Int(array),
            },
            _ => Values::Int(array),
        },
        other => other,
    }
}
