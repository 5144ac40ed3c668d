use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::LogicalType;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// A cell after coercion to its declared column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Numeric(Decimal),
    Boolean(bool),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Converts a value into the representation of a wider store type.
    ///
    /// Only the directions allowed by the compatibility relation change the
    /// value; everything else is returned untouched.
    pub fn widen(self, target: LogicalType) -> CellValue {
        match (self, target) {
            (CellValue::Integer(i), LogicalType::Real) => CellValue::Real(i as f64),
            (CellValue::Integer(i), LogicalType::Numeric) => CellValue::Numeric(Decimal::from(i)),
            // Shortest round-trip text, not the binary expansion of `f`.
            (CellValue::Real(f), LogicalType::Numeric) => match parse_numeric(&f.to_string()) {
                Some(decimal) => CellValue::Numeric(decimal.normalize()),
                None => CellValue::Real(f),
            },
            (CellValue::Date(d), LogicalType::Timestamp) => {
                CellValue::Timestamp(d.and_time(NaiveTime::MIN))
            }
            (value, _) => value,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("NULL"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Real(v) => write!(f, "{v}"),
            CellValue::Numeric(d) => write!(f, "{d}"),
            CellValue::Boolean(b) => write!(f, "{b}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {target}")]
pub struct InvalidCell {
    pub value: String,
    pub target: LogicalType,
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok()
}

/// Parses a finite 64-bit float; `inf` and `NaN` spellings are rejected.
pub fn parse_real(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

pub fn parse_numeric(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Coerces one raw cell into the representation of `target`.
///
/// A cell that is empty after trimming becomes [`CellValue::Null`] for every
/// type, text included. Timestamp columns also accept a bare date as
/// midnight.
pub fn coerce_cell(raw: &str, target: LogicalType) -> Result<CellValue, InvalidCell> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(CellValue::Null);
    }
    let parsed = match target {
        LogicalType::Text => Some(CellValue::Text(raw.to_string())),
        LogicalType::Integer | LogicalType::BigInt => parse_integer(trimmed).map(CellValue::Integer),
        LogicalType::Real => parse_real(trimmed).map(CellValue::Real),
        LogicalType::Numeric => parse_numeric(trimmed).map(CellValue::Numeric),
        LogicalType::Boolean => parse_boolean_token(trimmed).map(CellValue::Boolean),
        LogicalType::Date => parse_naive_date(trimmed).map(CellValue::Date),
        LogicalType::Timestamp => parse_naive_datetime(trimmed)
            .or_else(|| parse_naive_date(trimmed).map(|date| date.and_time(NaiveTime::MIN)))
            .map(CellValue::Timestamp),
    };
    parsed.ok_or_else(|| InvalidCell {
        value: raw.to_string(),
        target,
    })
}
