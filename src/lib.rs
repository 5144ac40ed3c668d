pub mod cli;
pub mod commit;
pub mod commit_cmd;
pub mod data;
pub mod error;
pub mod inference;
pub mod io_utils;
pub mod preview;
pub mod rows;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, DescribeArgs, StoreArgs},
    error::IngestError,
    table::TextTable,
};

pub use crate::{
    commit::{CancelFlag, CommitAction, CommitOptions, CommitRequest, CommitSummary, Committer},
    error::ErrorKind,
    rows::{ReadOptions, Row, RowSource},
    schema::{ColumnDefinition, InferredSchema, LogicalType, TargetTableSchema},
    store::{Store, StoreOptions},
};

static LOGGER: OnceLock<()> = OnceLock::new();

pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetbridge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => preview::execute(&args),
        Commands::Commit(args) => commit_cmd::execute(&args),
        Commands::Tables(args) => handle_tables(&args),
        Commands::Describe(args) => handle_describe(&args),
    }
}

/// Process exit status for a failed run: 2 when the input or request was at
/// fault, 1 for everything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let ingest = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<IngestError>());
    match ingest {
        Some(ingest) if ingest.is_user_error() => 2,
        _ => 1,
    }
}

fn handle_tables(args: &StoreArgs) -> Result<()> {
    let store = commit_cmd::open_store(args)?;
    let tables = store
        .list_tables()
        .with_context(|| format!("Listing tables in {:?}", args.database))?;
    for table in &tables {
        println!("{table}");
    }
    info!("Listed {} table(s)", tables.len());
    Ok(())
}

fn handle_describe(args: &DescribeArgs) -> Result<()> {
    let store = commit_cmd::open_store(&args.store)?;
    let schema = store
        .table_schema(&args.table)?
        .ok_or_else(|| IngestError::TableNotFound {
            table: args.table.clone(),
        })?;
    let rows = store
        .row_count(&schema.table)
        .with_context(|| format!("Counting rows in '{}'", schema.table))?;

    let mut table = TextTable::new(["column", "declared", "logical"]);
    for column in &schema.columns {
        table.push_row([
            column.name.clone(),
            column.declared_type.clone(),
            column.target_type.to_string(),
        ]);
    }
    println!("Table '{}' ({rows} row(s))", schema.table);
    table.print();
    Ok(())
}
