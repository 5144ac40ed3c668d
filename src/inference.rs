//! Sample-based column type inference.
//!
//! Every column starts with all candidate types possible. Each non-empty
//! sample cell removes the candidates it fails to parse as; empty cells never
//! remove anything. The surviving candidate that is most specific wins, in the
//! order BOOLEAN, INTEGER, REAL, TIMESTAMP, DATE, with TEXT as the fallback.
//! Integer tokens never count as booleans here, so a `0`/`1` column infers
//! INTEGER even though coercion into a BOOLEAN column accepts them.
//!
//! Inference is advisory: it only sees the sample, and callers may override
//! the result before committing.

use std::io::Read;

use log::debug;
use serde::Serialize;

use crate::{
    data::{parse_boolean_token, parse_integer, parse_naive_date, parse_naive_datetime, parse_real},
    error::Result,
    rows::{Row, RowSource},
    schema::{InferredSchema, LogicalType},
};

pub const DEFAULT_SAMPLE_ROWS: usize = 50;

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_boolean: bool,
    possible_integer: bool,
    possible_real: bool,
    possible_timestamp: bool,
    possible_date: bool,
    non_empty: usize,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_boolean: true,
            possible_integer: true,
            possible_real: true,
            possible_timestamp: true,
            possible_date: true,
            non_empty: 0,
        }
    }

    fn update(&mut self, value: &str) {
        self.non_empty += 1;
        if self.possible_boolean
            && (parse_boolean_token(value).is_none() || parse_integer(value).is_some())
        {
            self.possible_boolean = false;
        }
        if self.possible_integer && parse_integer(value).is_none() {
            self.possible_integer = false;
        }
        if self.possible_real && parse_real(value).is_none() {
            self.possible_real = false;
        }
        if self.possible_timestamp && parse_naive_datetime(value).is_none() {
            self.possible_timestamp = false;
        }
        if self.possible_date && parse_naive_date(value).is_none() {
            self.possible_date = false;
        }
    }

    fn decide(&self) -> LogicalType {
        if self.non_empty == 0 {
            LogicalType::Text
        } else if self.possible_boolean {
            LogicalType::Boolean
        } else if self.possible_integer {
            LogicalType::Integer
        } else if self.possible_real {
            LogicalType::Real
        } else if self.possible_timestamp {
            LogicalType::Timestamp
        } else if self.possible_date {
            LogicalType::Date
        } else {
            LogicalType::Text
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub non_empty: usize,
    pub sample_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferenceStats {
    pub rows_sampled: usize,
    pub columns: Vec<ColumnProfile>,
}

impl InferenceStats {
    pub fn sample_value(&self, column: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|profile| profile.sample_value.as_deref())
    }
}

/// Infers a schema from headers and an already-collected sample.
pub fn infer<S: AsRef<str>>(headers: &[String], sample_rows: &[Vec<S>]) -> InferredSchema {
    infer_with_stats(headers, sample_rows).0
}

pub fn infer_with_stats<S: AsRef<str>>(
    headers: &[String],
    sample_rows: &[Vec<S>],
) -> (InferredSchema, InferenceStats) {
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    let mut profiles = vec![ColumnProfile::default(); headers.len()];

    for row in sample_rows {
        for (idx, cell) in row.iter().take(headers.len()).enumerate() {
            let value = cell.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            candidates[idx].update(value);
            let profile = &mut profiles[idx];
            profile.non_empty += 1;
            if profile.sample_value.is_none() {
                profile.sample_value = Some(value.to_string());
            }
        }
    }

    let types = candidates
        .iter()
        .map(TypeCandidate::decide)
        .collect::<Vec<_>>();
    for (header, ty) in headers.iter().zip(&types) {
        debug!("Column '{header}' inferred as {ty}");
    }
    let stats = InferenceStats {
        rows_sampled: sample_rows.len(),
        columns: profiles,
    };
    (InferredSchema::from_parts(headers.to_vec(), types), stats)
}

/// Reads up to `sample_rows` rows from `source` and infers their schema.
///
/// The sampled rows are returned so a caller can display them; the source is
/// left positioned after the sample.
pub fn infer_from_source<R: Read>(
    source: &mut RowSource<R>,
    sample_rows: usize,
) -> Result<(InferredSchema, Vec<Row>)> {
    let mut sampled = Vec::with_capacity(sample_rows.min(1024));
    while sampled.len() < sample_rows {
        match source.next_row()? {
            Some(row) => sampled.push(row),
            None => break,
        }
    }
    let cells = sampled
        .iter()
        .map(|row| row.cells.clone())
        .collect::<Vec<_>>();
    let schema = infer(source.headers(), &cells);
    Ok((schema, sampled))
}
