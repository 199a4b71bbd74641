//! CDF time representations and their conversions
//!
//! * `CDF_EPOCH`: milliseconds since 0000-01-01T00:00:00 as `f64`
//! * `CDF_EPOCH16`: pairs of (seconds since 0000-01-01, picoseconds)
//! * `CDF_TIME_TT2000`: nanoseconds since J2000 in Terrestrial Time, `i64`
//!
//! Fill sentinels (`-1e31` for the epoch types, `i64::MIN` for TT2000) convert
//! to missing values. Anything that is not one of these types passes through.

use chrono::{DateTime, Utc};
use ndarray::ArrayD;

use crate::types::{DataType, Values};

/// Milliseconds between 0000-01-01 and the Unix epoch
const EPOCH_UNIX_OFFSET_MS: f64 = 62_167_219_200_000.0;

/// Seconds between 0000-01-01 and the Unix epoch
const EPOCH16_UNIX_OFFSET_S: f64 = 62_167_219_200.0;

/// J2000 (2000-01-01T12:00:00 TT) as nanoseconds of TAI counted from the Unix epoch
const J2000_TAI_UNIX_NS: i128 = 946_727_967_816_000_000;

const EPOCH_FILL: f64 = -1.0e31;
const TT2000_FILL: i64 = i64::MIN;

/// (UTC Unix second at which the offset starts, TAI - UTC in seconds)
const LEAP_SECONDS: &[(i64, i64)] = &[
    (63_072_000, 10),
    (78_796_800, 11),
    (94_694_400, 12),
    (126_230_400, 13),
    (157_766_400, 14),
    (189_302_400, 15),
    (220_924_800, 16),
    (252_460_800, 17),
    (283_996_800, 18),
    (315_532_800, 19),
    (362_793_600, 20),
    (394_329_600, 21),
    (425_865_600, 22),
    (489_024_000, 23),
    (567_993_600, 24),
    (631_152_000, 25),
    (662_688_000, 26),
    (709_948_800, 27),
    (741_484_800, 28),
    (773_020_800, 29),
    (820_454_400, 30),
    (867_715_200, 31),
    (915_148_800, 32),
    (1_136_073_600, 33),
    (1_230_768_000, 34),
    (1_341_100_800, 35),
    (1_435_708_800, 36),
    (1_483_228_800, 37),
];

fn is_epoch_fill(value: f64) -> bool {
    !value.is_finite() || value <= EPOCH_FILL
}

/// TAI - UTC for an instant given as TAI nanoseconds since the Unix epoch.
fn tai_minus_utc(tai_unix_ns: i128) -> i64 {
    LEAP_SECONDS
        .iter()
        .rev()
        .find(|(utc_start, offset)| {
            tai_unix_ns >= i128::from(utc_start + offset) * 1_000_000_000
        })
        .map(|&(_, offset)| offset)
        .unwrap_or(LEAP_SECONDS[0].1)
}

/// TT2000 nanoseconds to UTC nanoseconds since the Unix epoch.
fn tt2000_to_unix_ns(tt2000: i64) -> Option<i128> {
    if tt2000 == TT2000_FILL {
        return None;
    }
    let tai = J2000_TAI_UNIX_NS + i128::from(tt2000);
    Some(tai - i128::from(tai_minus_utc(tai)) * 1_000_000_000)
}

fn unix_ns_to_datetime(ns: i128) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(ns.div_euclid(1_000_000_000)).ok()?;
    let nanos = u32::try_from(ns.rem_euclid(1_000_000_000)).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

fn unix_seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    unix_ns_to_datetime((seconds * 1.0e9).round() as i128)
}

fn epoch_to_unix_seconds(ms: f64) -> f64 {
    if is_epoch_fill(ms) {
        f64::NAN
    } else {
        (ms - EPOCH_UNIX_OFFSET_MS) / 1000.0
    }
}

fn epoch16_to_unix_ns(pair: [f64; 2]) -> Option<i128> {
    if is_epoch_fill(pair[0]) {
        return None;
    }
    let seconds = (pair[0] - EPOCH16_UNIX_OFFSET_S) as i128;
    Some(seconds * 1_000_000_000 + (pair[1] / 1000.0).floor() as i128)
}

fn float_times(values: &Values) -> Option<ArrayD<f64>> {
    match values {
        Values::Float(a) => Some(a.clone()),
        Values::Int(a) => Some(a.mapv(|v| v as f64)),
        _ => None,
    }
}

fn tt2000_times(values: &Values) -> Option<ArrayD<i64>> {
    match values {
        Values::Int(a) => Some(a.clone()),
        Values::Float(a) => Some(a.mapv(|v| {
            if v.is_finite() {
                v as i64
            } else {
                TT2000_FILL
            }
        })),
        _ => None,
    }
}

/// Convert epoch values of `data_type` to UTC calendar times.
pub fn epoch_to_calendar(values: &Values, data_type: DataType) -> Values {
    match (data_type, values) {
        (DataType::Epoch, _) => match float_times(values) {
            Some(a) => Values::DateTime(
                a.mapv(|ms| unix_seconds_to_datetime(epoch_to_unix_seconds(ms))),
            ),
            None => values.clone(),
        },
        (DataType::Epoch16, Values::Epoch16(a)) => Values::DateTime(
            a.mapv(|pair| epoch16_to_unix_ns(pair).and_then(unix_ns_to_datetime)),
        ),
        (DataType::TimeTt2000, _) => match tt2000_times(values) {
            Some(a) => Values::DateTime(
                a.mapv(|ns| tt2000_to_unix_ns(ns).and_then(unix_ns_to_datetime)),
            ),
            None => values.clone(),
        },
        _ => values.clone(),
    }
}

/// Convert epoch values of `data_type` to seconds since the Unix epoch (NaN for fills).
pub fn epoch_to_unixtime(values: &Values, data_type: DataType) -> Values {
    match (data_type, values) {
        (DataType::Epoch, _) => match float_times(values) {
            Some(a) => Values::Float(a.mapv(epoch_to_unix_seconds)),
            None => values.clone(),
        },
        (DataType::Epoch16, Values::Epoch16(a)) => Values::Float(a.mapv(|pair| {
            epoch16_to_unix_ns(pair)
                .map(|ns| ns as f64 / 1.0e9)
                .unwrap_or(f64::NAN)
        })),
        (DataType::TimeTt2000, _) => match tt2000_times(values) {
            Some(a) => Values::Float(a.mapv(|ns| {
                tt2000_to_unix_ns(ns)
                    .map(|utc| utc as f64 / 1.0e9)
                    .unwrap_or(f64::NAN)
            })),
            None => values.clone(),
        },
        _ => values.clone(),
    }
}

/// Narrow `CDF_EPOCH16` pairs to `CDF_EPOCH` milliseconds, truncating below one millisecond.
pub fn epoch16_narrow(values: &Values) -> Values {
    match values {
        Values::Epoch16(a) => Values::Float(a.mapv(|pair| {
            if is_epoch_fill(pair[0]) {
                EPOCH_FILL
            } else {
                pair[0] * 1000.0 + (pair[1] / 1.0e9).floor()
            }
        })),
        other => other.clone(),
    }
}
