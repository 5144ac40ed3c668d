//! SQLite-backed table store.
//!
//! All tables live in the `main` schema. Writes go through a
//! [`StoreTransaction`], which is opened with `BEGIN IMMEDIATE` so that two
//! writers racing on the same table are serialized by the database lock and
//! the loser sees the winner's DDL.

use std::{path::Path, time::Duration};

use itertools::Itertools;
use log::debug;
use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior, params_from_iter,
    types::{ToSql, ToSqlOutput, Value, ValueRef},
};

use crate::{
    data::CellValue,
    error::{IngestError, Result},
    schema::{ColumnDefinition, TargetColumn, TargetTableSchema},
};

/// Upper bound on bound parameters in one statement for the bundled SQLite.
pub const MAX_BOUND_PARAMETERS: usize = 32_766;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a writer waits for another writer's lock before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        debug!("Opened database {path:?}");
        Ok(Self { conn })
    }

    /// Opens an existing database for catalog reads; a missing file is an
    /// error instead of being created.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened database {path:?} read-only");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Names of user tables, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn table_schema(&self, table: &str) -> Result<Option<TargetTableSchema>> {
        read_table_schema(&self.conn, table)
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Starts a write transaction. Dropping the guard without calling
    /// [`StoreTransaction::commit`] rolls everything back.
    pub fn begin(&mut self) -> Result<StoreTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTransaction { tx })
    }
}

pub struct StoreTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTransaction<'_> {
    pub fn table_schema(&self, table: &str) -> Result<Option<TargetTableSchema>> {
        read_table_schema(&self.tx, table)
    }

    pub fn create_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<()> {
        let body = columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column.logical_type.as_sql()
                )
            })
            .join(", ");
        let sql = format!("CREATE TABLE {} ({body})", quote_identifier(table));
        debug!("{sql}");
        self.tx.execute(&sql, []).map_err(|err| {
            if is_already_exists(&err) {
                IngestError::TableAlreadyExists {
                    table: table.to_string(),
                }
            } else {
                IngestError::Storage(err)
            }
        })?;
        Ok(())
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote_identifier(table));
        debug!("{sql}");
        self.tx.execute(&sql, [])?;
        Ok(())
    }

    /// Inserts `rows` with one multi-row `INSERT`. Statements are cached per
    /// shape, so repeated batches of the same size reuse one prepared
    /// statement.
    pub fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let placeholders = format!("({})", std::iter::repeat_n("?", columns.len()).join(", "));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_identifier(table),
            columns.iter().map(|c| quote_identifier(c)).join(", "),
            std::iter::repeat_n(placeholders.as_str(), rows.len()).join(", ")
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;
        let inserted = stmt.execute(params_from_iter(rows.iter().flatten()))?;
        debug!("Inserted batch of {inserted} row(s) into {table}");
        Ok(inserted)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

/// Largest row count whose parameters fit in one statement.
pub fn max_rows_per_statement(column_count: usize) -> usize {
    (MAX_BOUND_PARAMETERS / column_count.max(1)).max(1)
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn read_table_schema(conn: &Connection, table: &str) -> Result<Option<TargetTableSchema>> {
    let stored_name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    let Some(stored_name) = stored_name else {
        return Ok(None);
    };
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([&stored_name], |row| {
            Ok(TargetColumn::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(TargetTableSchema {
        table: stored_name,
        columns,
    }))
}

fn is_already_exists(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains("already exists")
    )
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            CellValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Numeric(_) | CellValue::Date(_) | CellValue::Timestamp(_) => {
                ToSqlOutput::Owned(Value::Text(self.to_string()))
            }
        };
        Ok(output)
    }
}
