use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cli::{CommitArgs, StoreArgs},
    commit::{CommitOptions, CommitRequest, Committer},
    inference, io_utils,
    rows::{ReadOptions, RowSource},
    sanitize,
    schema::SchemaOverride,
    store::{Store, StoreOptions},
};

/// The input is read twice: once to sample types, once to load. Stdin is
/// buffered so the second pass sees the same bytes.
enum Input {
    Stdin(Vec<u8>),
    File(PathBuf),
}

impl Input {
    fn resolve(path: &Path) -> Result<Self> {
        if io_utils::is_dash(path) {
            let mut buffer = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buffer)
                .context("Reading CSV from stdin")?;
            Ok(Input::Stdin(buffer))
        } else {
            Ok(Input::File(path.to_path_buf()))
        }
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            Input::Stdin(buffer) => Ok(Box::new(Cursor::new(buffer.as_slice()))),
            Input::File(path) => io_utils::open_input(path),
        }
    }
}

pub fn open_store(args: &StoreArgs) -> Result<Store> {
    let options = StoreOptions {
        busy_timeout: Duration::from_millis(args.busy_timeout_ms),
    };
    Store::open(&args.database, &options)
        .with_context(|| format!("Opening database {:?}", args.database))
}

pub fn execute(args: &CommitArgs) -> Result<()> {
    let path = &args.input.input;
    let read_options = ReadOptions {
        delimiter: io_utils::resolve_input_delimiter(path, args.input.delimiter),
        encoding: io_utils::resolve_encoding(args.input.input_encoding.as_deref())?,
    };
    let table_name = match &args.table {
        Some(table) => table.clone(),
        None => default_table_name(path),
    };
    info!(
        "Committing {path:?} into '{table_name}' ({}) with delimiter '{}'",
        args.action,
        io_utils::printable_delimiter(read_options.delimiter)
    );

    let input = Input::resolve(path)?;
    let mut sample_source = RowSource::open(input.open()?, &read_options)
        .with_context(|| format!("Reading header from {path:?}"))?;
    let (mut schema, sampled) = inference::infer_from_source(&mut sample_source, args.sample_rows)
        .with_context(|| format!("Sampling rows from {path:?}"))?;
    debug!("Inferred schema from {} sampled row(s)", sampled.len());

    if let Some(schema_path) = &args.schema {
        let overrides = SchemaOverride::load(schema_path)
            .with_context(|| format!("Loading schema override from {schema_path:?}"))?;
        schema = schema
            .with_overrides(&overrides.columns)
            .with_context(|| format!("Applying schema override from {schema_path:?}"))?;
    }

    let request = CommitRequest {
        table_name,
        action: args.action,
        columns: schema.into_columns(),
        source_rows: RowSource::open(input.open()?, &read_options)?,
    };
    let mut store = open_store(&args.store)?;
    let options = CommitOptions {
        batch_size: args.batch_size,
        ..CommitOptions::default()
    };
    let summary = Committer::new(&mut store, options)
        .commit(request)
        .with_context(|| format!("Committing {path:?}"))?;
    println!("{summary}");
    Ok(())
}

/// Table name derived from the input file stem, as the upload form does.
fn default_table_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|_| !io_utils::is_dash(path))
        .unwrap_or_default();
    sanitize::sanitize_table_name(stem)
}
