use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commit::CommitAction;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer SQL schemas from CSV files and load them into tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the inferred schema and the first rows of a CSV file
    Preview(PreviewArgs),
    /// Create, overwrite or append to a table from a CSV file in one transaction
    Commit(CommitArgs),
    /// List tables in the database
    Tables(StoreArgs),
    /// Show the columns of an existing table
    Describe(DescribeArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// SQLite database file
    #[arg(long, env = "SHEETBRIDGE_DATABASE")]
    pub database: PathBuf,
    /// Milliseconds to wait for another writer's lock
    #[arg(long, env = "SHEETBRIDGE_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to sample and display
    #[arg(long, env = "SHEETBRIDGE_SAMPLE_ROWS", default_value_t = 50)]
    pub rows: usize,
    /// Emit the preview as JSON instead of text tables
    #[arg(long)]
    pub json: bool,
    /// Write the inferred columns to an editable YAML override file
    #[arg(long = "write-schema")]
    pub write_schema: Option<PathBuf>,
    /// Database to list existing tables from
    #[arg(long, env = "SHEETBRIDGE_DATABASE")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CommitArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub store: StoreArgs,
    /// Target table (defaults to the sanitized input file name)
    #[arg(short = 't', long)]
    pub table: Option<String>,
    /// What to do with the target table
    #[arg(short = 'a', long, value_enum, ignore_case = true)]
    pub action: CommitAction,
    /// YAML or JSON column override file, one entry per CSV column
    #[arg(short = 's', long)]
    pub schema: Option<PathBuf>,
    /// Number of rows to sample when inferring column types
    #[arg(long, env = "SHEETBRIDGE_SAMPLE_ROWS", default_value_t = 50)]
    pub sample_rows: usize,
    /// Rows per INSERT statement
    #[arg(long, env = "SHEETBRIDGE_BATCH_SIZE", default_value_t = 500)]
    pub batch_size: usize,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Table to describe
    #[arg(short = 't', long)]
    pub table: String,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
