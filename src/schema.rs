//! Logical column types and the schemas built from them.
//!
//! [`InferredSchema`] describes a CSV upload and is index-aligned with its
//! header row. [`TargetTableSchema`] describes a live table as reported by the
//! store catalog; its [`TargetType`] keeps the declared SQL spelling around
//! because the catalog may hold types (e.g. `VARCHAR(40)`) that have no
//! [`LogicalType`] of their own.

use std::{fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    error::{IngestError, Result},
    sanitize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Text,
    Integer,
    BigInt,
    Numeric,
    Real,
    Date,
    Timestamp,
    Boolean,
}

impl LogicalType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalType::Text => "TEXT",
            LogicalType::Integer => "INTEGER",
            LogicalType::BigInt => "BIGINT",
            LogicalType::Numeric => "NUMERIC",
            LogicalType::Real => "REAL",
            LogicalType::Date => "DATE",
            LogicalType::Timestamp => "TIMESTAMP",
            LogicalType::Boolean => "BOOLEAN",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "TEXT",
            "INTEGER",
            "BIGINT",
            "NUMERIC",
            "REAL",
            "DATE",
            "TIMESTAMP",
            "BOOLEAN",
        ]
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for LogicalType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match TargetType::from_declared(value) {
            TargetType::Logical(logical) => Ok(logical),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                LogicalType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for LogicalType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_sql())
    }
}

impl<'de> Deserialize<'de> for LogicalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(|err: anyhow::Error| de::Error::custom(err))
    }
}

/// A column type as declared in the store catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Logical(LogicalType),
    CharacterVarying,
    Unrecognized,
}

impl TargetType {
    /// Classifies a declared SQL type such as `BIGINT`, `VARCHAR(40)` or
    /// `timestamp without time zone`.
    pub fn from_declared(declared: &str) -> TargetType {
        let lowered = declared.trim().to_ascii_lowercase();
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match base.as_str() {
            "text" => TargetType::Logical(LogicalType::Text),
            "integer" | "int" | "int4" => TargetType::Logical(LogicalType::Integer),
            "bigint" | "int8" => TargetType::Logical(LogicalType::BigInt),
            "numeric" | "decimal" => TargetType::Logical(LogicalType::Numeric),
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
                TargetType::Logical(LogicalType::Real)
            }
            "date" => TargetType::Logical(LogicalType::Date),
            "timestamp"
            | "timestamptz"
            | "datetime"
            | "timestamp without time zone"
            | "timestamp with time zone" => TargetType::Logical(LogicalType::Timestamp),
            "boolean" | "bool" => TargetType::Logical(LogicalType::Boolean),
            "varchar" | "character varying" | "char" | "character" | "bpchar" | "nvarchar"
            | "nchar" | "varying character" | "native character" => TargetType::CharacterVarying,
            _ => TargetType::Unrecognized,
        }
    }

    pub fn logical(&self) -> Option<LogicalType> {
        match self {
            TargetType::Logical(logical) => Some(*logical),
            _ => None,
        }
    }
}

impl From<LogicalType> for TargetType {
    fn from(value: LogicalType) -> Self {
        TargetType::Logical(value)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Logical(logical) => write!(f, "{logical}"),
            TargetType::CharacterVarying => f.write_str("CHARACTER VARYING"),
            TargetType::Unrecognized => f.write_str("UNRECOGNIZED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }
}

/// Schema inferred from one upload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredSchema {
    headers: Vec<String>,
    columns: Vec<ColumnDefinition>,
}

impl InferredSchema {
    /// Builds a schema from raw headers and per-column types.
    ///
    /// Names are sanitized and disambiguated here, so every schema in the
    /// crate holds unique identifiers.
    pub(crate) fn from_parts(headers: Vec<String>, types: Vec<LogicalType>) -> Self {
        debug_assert_eq!(headers.len(), types.len());
        let names = sanitize::unique_identifiers(&headers);
        let columns = names
            .into_iter()
            .zip(types)
            .map(|(name, logical_type)| ColumnDefinition { name, logical_type })
            .collect();
        Self { headers, columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Original header text, index-aligned with [`Self::columns`].
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a new schema with caller-supplied names and types applied.
    ///
    /// The override list must have one entry per column. Overridden names go
    /// through the sanitizer again and collisions are resolved the same way
    /// as for inferred names.
    pub fn with_overrides(&self, overrides: &[ColumnOverride]) -> Result<InferredSchema> {
        if overrides.len() != self.columns.len() {
            return Err(IngestError::OverrideCardinality {
                expected: self.columns.len(),
                found: overrides.len(),
            });
        }
        let names = self
            .columns
            .iter()
            .zip(overrides)
            .map(|(column, item)| match item.name.as_deref() {
                Some(name) => sanitize::sanitize(name),
                None => column.name.clone(),
            })
            .collect::<Vec<_>>();
        let names = sanitize::disambiguate(names);
        let columns = names
            .into_iter()
            .zip(self.columns.iter().zip(overrides))
            .map(|(name, (column, item))| ColumnDefinition {
                name,
                logical_type: item.logical_type.unwrap_or(column.logical_type),
            })
            .collect();
        Ok(InferredSchema {
            headers: self.headers.clone(),
            columns,
        })
    }

    pub fn into_columns(self) -> Vec<ColumnDefinition> {
        self.columns
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOverride {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub logical_type: Option<LogicalType>,
}

/// Caller-edited column list, loaded from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOverride {
    pub columns: Vec<ColumnOverride>,
}

impl SchemaOverride {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_reader(reader).context("Parsing schema JSON")?
        } else {
            serde_yaml::from_reader(reader).context("Parsing schema YAML")?
        };
        Ok(parsed)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }
}

impl From<&InferredSchema> for SchemaOverride {
    fn from(schema: &InferredSchema) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|column| ColumnOverride {
                name: Some(column.name.clone()),
                logical_type: Some(column.logical_type),
            })
            .collect();
        SchemaOverride { columns }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetColumn {
    pub name: String,
    pub declared_type: String,
    #[serde(skip)]
    pub target_type: TargetType,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let target_type = TargetType::from_declared(&declared_type);
        Self {
            name: name.into(),
            declared_type,
            target_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetTableSchema {
    pub table: String,
    pub columns: Vec<TargetColumn>,
}

impl TargetTableSchema {
    pub fn find(&self, name: &str) -> Option<&TargetColumn> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }
}
