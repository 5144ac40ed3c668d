//! Schema compatibility checks between an upload and a live table.

use thiserror::Error;

use crate::schema::{ColumnDefinition, LogicalType, TargetTableSchema, TargetType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("Cannot validate an empty schema")]
    EmptySchema,

    #[error("Column count mismatch: CSV has {source_count} column(s), table has {target_count}")]
    ColumnCountMismatch {
        source_count: usize,
        target_count: usize,
    },

    #[error("Column '{name}' from CSV not found in table")]
    ColumnNotFound { name: String },

    #[error(
        "Type mismatch for column '{column}': CSV type {source_type} is not compatible with table type {target_type}"
    )]
    TypeMismatch {
        column: String,
        source_type: LogicalType,
        target_type: String,
    },
}

/// Whether values of `source` may be stored in a column of `target`.
///
/// The relation is directional: `INTEGER` fits a `BIGINT` column, but a
/// `NUMERIC` value does not fit an `INTEGER` column.
pub fn compatible(source: LogicalType, target: impl Into<TargetType>) -> bool {
    use LogicalType::*;

    match target.into() {
        TargetType::Logical(target) if target == source => true,
        TargetType::Logical(target) => matches!(
            (source, target),
            (Integer, BigInt | Numeric | Real) | (Real, Numeric) | (Date, Timestamp)
        ),
        TargetType::CharacterVarying => source == Text,
        TargetType::Unrecognized => false,
    }
}

/// A source column matched to the table column that will receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub source: ColumnDefinition,
    /// Name as spelled in the catalog.
    pub target_name: String,
    pub target_type: TargetType,
}

pub fn validate(
    source: &[ColumnDefinition],
    target: &TargetTableSchema,
) -> Result<(), SchemaMismatch> {
    plan_columns(source, target).map(|_| ())
}

/// Validates `source` against `target` and pairs each source column with its
/// target column, in source order.
///
/// Columns are matched by case-insensitive name, not position. The first
/// violated rule fails the whole validation.
pub fn plan_columns(
    source: &[ColumnDefinition],
    target: &TargetTableSchema,
) -> Result<Vec<ColumnPlan>, SchemaMismatch> {
    if source.is_empty() || target.columns.is_empty() {
        return Err(SchemaMismatch::EmptySchema);
    }
    if source.len() != target.columns.len() {
        return Err(SchemaMismatch::ColumnCountMismatch {
            source_count: source.len(),
            target_count: target.columns.len(),
        });
    }
    source
        .iter()
        .map(|column| {
            let existing =
                target
                    .find(&column.name)
                    .ok_or_else(|| SchemaMismatch::ColumnNotFound {
                        name: column.name.clone(),
                    })?;
            if !compatible(column.logical_type, existing.target_type) {
                return Err(SchemaMismatch::TypeMismatch {
                    column: column.name.clone(),
                    source_type: column.logical_type,
                    target_type: existing.declared_type.clone(),
                });
            }
            Ok(ColumnPlan {
                source: column.clone(),
                target_name: existing.name.clone(),
                target_type: existing.target_type,
            })
        })
        .collect()
}
