//! Transactional create/overwrite/append of a CSV stream into a table.
//!
//! A commit runs entirely inside one [`StoreTransaction`]: DDL, every batch
//! of rows, and the final `COMMIT`. Any failure, including a cancellation or
//! a panic, drops the transaction guard and rolls the store back to what it
//! was before the call.

use std::{
    fmt,
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::anyhow;
use clap::ValueEnum;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{CellValue, coerce_cell},
    error::{IngestError, Result},
    rows::{Row, RowSource},
    sanitize,
    schema::{ColumnDefinition, LogicalType},
    store::{Store, StoreTransaction, max_rows_per_statement},
    validate::{self, SchemaMismatch},
};

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    /// Create a new table; fails if it already exists.
    Create,
    /// Replace an existing table's definition and contents.
    Overwrite,
    /// Add rows to an existing, compatible table.
    Append,
}

impl CommitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitAction::Create => "create",
            CommitAction::Overwrite => "overwrite",
            CommitAction::Append => "append",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommitAction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(CommitAction::Create),
            "overwrite" => Ok(CommitAction::Overwrite),
            "append" => Ok(CommitAction::Append),
            _ => Err(anyhow!(
                "Unknown action '{value}'. Expected one of: create, overwrite, append"
            )),
        }
    }
}

/// Shared cancellation signal, checked by the committer between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct CommitOptions {
    /// Rows per `INSERT` statement, before the parameter-limit cap.
    pub batch_size: usize,
    pub cancel: Option<CancelFlag>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }
}

pub struct CommitRequest<R: Read> {
    pub table_name: String,
    pub action: CommitAction,
    pub columns: Vec<ColumnDefinition>,
    pub source_rows: RowSource<R>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommitState {
    Start,
    SchemaResolved,
    DataLoaded,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub table: String,
    pub action: CommitAction,
    pub rows_loaded: usize,
    pub columns: Vec<ColumnDefinition>,
    pub state: CommitState,
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            CommitAction::Create => "Created table",
            CommitAction::Overwrite => "Overwrote table",
            CommitAction::Append => "Appended to table",
        };
        write!(
            f,
            "{verb} '{}': {} row(s) loaded into {} column(s)",
            self.table,
            self.rows_loaded,
            self.columns.len()
        )
    }
}

/// Where each source column lands and the type its values are bound as.
struct LoadPlan {
    target_names: Vec<String>,
    bind_types: Vec<Option<LogicalType>>,
}

impl LoadPlan {
    fn from_request(columns: &[ColumnDefinition]) -> Self {
        Self {
            target_names: columns.iter().map(|c| c.name.clone()).collect(),
            bind_types: columns.iter().map(|c| Some(c.logical_type)).collect(),
        }
    }
}

pub struct Committer<'store> {
    store: &'store mut Store,
    options: CommitOptions,
}

impl<'store> Committer<'store> {
    pub fn new(store: &'store mut Store, options: CommitOptions) -> Self {
        Self { store, options }
    }

    /// Applies `request` atomically and reports what was loaded.
    pub fn commit<R: Read>(&mut self, request: CommitRequest<R>) -> Result<CommitSummary> {
        let CommitRequest {
            table_name,
            action,
            columns,
            mut source_rows,
        } = request;
        let table = sanitize::sanitize_table_name(&table_name);
        let columns = canonical_columns(columns);
        let mut state = CommitState::Start;

        let source_count = source_rows.headers().len();
        if source_count != columns.len() {
            return Err(SchemaMismatch::ColumnCountMismatch {
                source_count,
                target_count: columns.len(),
            }
            .into());
        }

        let options = self.options.clone();
        let tx = self.store.begin()?;
        let outcome = run_commit(
            &tx,
            &table,
            action,
            &columns,
            &mut source_rows,
            &options,
            &mut state,
        )
        .and_then(|rows_loaded| {
            tx.commit()?;
            Ok(rows_loaded)
        });

        match outcome {
            Ok(rows_loaded) => {
                transition(&table, &mut state, CommitState::Committed);
                info!("Committed {rows_loaded} row(s) into '{table}' ({action})");
                Ok(CommitSummary {
                    table,
                    action,
                    rows_loaded,
                    columns,
                    state,
                })
            }
            Err(err) => {
                transition(&table, &mut state, CommitState::RolledBack);
                if err.is_user_error() {
                    warn!("Rolled back {action} of '{table}': {err}");
                } else {
                    error!("Rolled back {action} of '{table}': {err}");
                }
                Err(err)
            }
        }
    }
}

/// Request columns under the identifiers used for DDL: sanitized, then made
/// unique case-insensitively. Names that are already canonical pass through.
fn canonical_columns(columns: Vec<ColumnDefinition>) -> Vec<ColumnDefinition> {
    let names = sanitize::unique_identifiers(
        &columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
    );
    columns
        .into_iter()
        .zip(names)
        .map(|(column, name)| ColumnDefinition { name, ..column })
        .collect()
}

fn transition(table: &str, state: &mut CommitState, next: CommitState) {
    debug!("Commit of '{table}': {state:?} -> {next:?}");
    *state = next;
}

fn run_commit<R: Read>(
    tx: &StoreTransaction<'_>,
    table: &str,
    action: CommitAction,
    columns: &[ColumnDefinition],
    source: &mut RowSource<R>,
    options: &CommitOptions,
    state: &mut CommitState,
) -> Result<usize> {
    let existing = tx.table_schema(table)?;
    let plan = match (action, existing) {
        (CommitAction::Create, Some(existing)) => {
            return Err(IngestError::TableAlreadyExists {
                table: existing.table,
            });
        }
        (CommitAction::Overwrite | CommitAction::Append, None) => {
            return Err(IngestError::TableNotFound {
                table: table.to_string(),
            });
        }
        (CommitAction::Create, None) => {
            tx.create_table(table, columns)?;
            LoadPlan::from_request(columns)
        }
        (CommitAction::Overwrite, Some(existing)) => {
            validate::validate(columns, &existing)?;
            tx.drop_table(&existing.table)?;
            tx.create_table(table, columns)?;
            LoadPlan::from_request(columns)
        }
        (CommitAction::Append, Some(existing)) => {
            let planned = validate::plan_columns(columns, &existing)?;
            LoadPlan {
                target_names: planned.iter().map(|p| p.target_name.clone()).collect(),
                bind_types: planned.iter().map(|p| p.target_type.logical()).collect(),
            }
        }
    };
    transition(table, state, CommitState::SchemaResolved);

    let loaded = load_rows(tx, table, columns, &plan, source, options)?;
    transition(table, state, CommitState::DataLoaded);
    Ok(loaded)
}

fn load_rows<R: Read>(
    tx: &StoreTransaction<'_>,
    table: &str,
    columns: &[ColumnDefinition],
    plan: &LoadPlan,
    source: &mut RowSource<R>,
    options: &CommitOptions,
) -> Result<usize> {
    let rows_per_batch = options
        .batch_size
        .max(1)
        .min(max_rows_per_statement(columns.len()));
    debug!("Loading '{table}' in batches of up to {rows_per_batch} row(s)");

    let mut batch = Vec::with_capacity(rows_per_batch);
    let mut loaded = 0;
    loop {
        if options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(IngestError::Cancelled);
        }
        batch.clear();
        while batch.len() < rows_per_batch {
            match source.next_row()? {
                Some(row) => batch.push(coerce_row(&row, columns, plan)?),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        loaded += tx.insert_batch(table, &plan.target_names, &batch)?;
        if batch.len() < rows_per_batch {
            break;
        }
    }
    Ok(loaded)
}

fn coerce_row(row: &Row, columns: &[ColumnDefinition], plan: &LoadPlan) -> Result<Vec<CellValue>> {
    row.cells
        .iter()
        .zip(columns)
        .zip(&plan.bind_types)
        .map(|((raw, column), bind_type)| {
            let value = coerce_cell(raw, column.logical_type).map_err(|invalid| {
                IngestError::TypeConversion {
                    row: row.index,
                    column: column.name.clone(),
                    raw_value: invalid.value,
                    target_type: invalid.target,
                }
            })?;
            Ok(match bind_type {
                Some(target) => value.widen(*target),
                None => value,
            })
        })
        .collect()
}
