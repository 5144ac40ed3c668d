use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    cli::PreviewArgs,
    inference::{self, InferenceStats},
    io_utils,
    rows::{ReadOptions, RowSource},
    schema::{ColumnDefinition, InferredSchema, SchemaOverride},
    store::Store,
    table::TextTable,
};

/// Machine-readable preview: inferred columns, sample rows and the tables a
/// commit could target.
#[derive(Debug, Serialize)]
pub struct PreviewDocument<'a> {
    pub columns: &'a [ColumnDefinition],
    pub rows: Vec<&'a [String]>,
    pub tables: Vec<String>,
}

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let options = ReadOptions {
        delimiter: io_utils::resolve_input_delimiter(&args.input.input, args.input.delimiter),
        encoding: io_utils::resolve_encoding(args.input.input_encoding.as_deref())?,
    };
    info!(
        "Previewing {:?} with delimiter '{}'",
        args.input.input,
        io_utils::printable_delimiter(options.delimiter)
    );
    let reader = io_utils::open_input(&args.input.input)?;
    let mut source = RowSource::open(reader, &options)
        .with_context(|| format!("Reading header from {:?}", args.input.input))?;
    let rows = source
        .read_preview(args.rows)
        .with_context(|| format!("Reading rows from {:?}", args.input.input))?;
    let cells = rows.iter().map(|row| row.cells.clone()).collect::<Vec<_>>();
    let (schema, stats) = inference::infer_with_stats(source.headers(), &cells);

    if let Some(path) = &args.write_schema {
        SchemaOverride::from(&schema)
            .save(path)
            .with_context(|| format!("Writing schema override to {path:?}"))?;
        info!("Wrote {} column override(s) to {path:?}", schema.len());
    }

    let tables = match &args.database {
        Some(path) if path.exists() => Store::open_read_only(path)
            .and_then(|store| store.list_tables())
            .with_context(|| format!("Listing tables in {path:?}"))?,
        Some(path) => {
            info!("Database {path:?} does not exist yet; no tables to list");
            Vec::new()
        }
        None => Vec::new(),
    };

    if args.json {
        let document = PreviewDocument {
            columns: schema.columns(),
            rows: cells.iter().map(Vec::as_slice).collect(),
            tables,
        };
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print!("{}", render_text(&schema, &stats, &cells, &tables));
    }
    info!(
        "Previewed {} column(s) from {} sampled row(s)",
        schema.len(),
        stats.rows_sampled
    );
    Ok(())
}

fn render_text(
    schema: &InferredSchema,
    stats: &InferenceStats,
    cells: &[Vec<String>],
    tables: &[String],
) -> String {
    let mut columns = TextTable::new(["#", "header", "name", "type", "sample"]);
    for (idx, (header, column)) in schema.headers().iter().zip(schema.columns()).enumerate() {
        columns.push_row([
            (idx + 1).to_string(),
            header.clone(),
            column.name.clone(),
            column.logical_type.to_string(),
            stats.sample_value(idx).unwrap_or_default().to_string(),
        ]);
    }

    let mut sample = TextTable::new(schema.columns().iter().map(|c| c.name.clone()));
    for row in cells {
        sample.push_row(row.iter().cloned());
    }

    let mut output = columns.render();
    output.push('\n');
    output.push_str(&sample.render());
    if !tables.is_empty() {
        output.push_str(&format!("\nExisting tables: {}\n", tables.join(", ")));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_preview_lists_columns_then_rows() {
        let headers = vec!["Full Name".to_string(), "Age".to_string()];
        let cells = vec![
            vec!["Ann".to_string(), "31".to_string()],
            vec!["Bo".to_string(), String::new()],
        ];
        let (schema, stats) = inference::infer_with_stats(&headers, &cells);
        let rendered = render_text(&schema, &stats, &cells, &["people".to_string()]);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("#"));
        assert!(lines[2].contains("Full Name") && lines[2].contains("full_name"));
        assert!(lines[3].contains("INTEGER") && lines[3].ends_with("31"));
        assert!(rendered.contains("full_name  age"));
        assert!(rendered.ends_with("Existing tables: people\n"));
    }

    #[test]
    fn json_document_mirrors_columns_and_rows() {
        let headers = vec!["id".to_string()];
        let cells = vec![vec!["7".to_string()]];
        let schema = inference::infer(&headers, &cells);
        let document = PreviewDocument {
            columns: schema.columns(),
            rows: cells.iter().map(Vec::as_slice).collect(),
            tables: Vec::new(),
        };
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["columns"][0]["name"], "id");
        assert_eq!(value["columns"][0]["type"], "INTEGER");
        assert_eq!(value["rows"][0][0], "7");
    }
}
