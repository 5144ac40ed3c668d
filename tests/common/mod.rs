#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use sheetbridge::{
    ColumnDefinition, CommitAction, CommitRequest, ReadOptions, RowSource, Store, StoreOptions,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory holding CSV inputs and a database file.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn database(&self) -> PathBuf {
        self.temp_dir.path().join("sheetbridge.sqlite")
    }

    pub fn open_store(&self) -> Store {
        Store::open(&self.database(), &StoreOptions::default()).expect("open store")
    }
}

pub fn source(csv: &str) -> RowSource<Cursor<Vec<u8>>> {
    RowSource::open(
        Cursor::new(csv.as_bytes().to_vec()),
        &ReadOptions::default(),
    )
    .expect("open row source")
}

pub fn request(
    table: &str,
    action: CommitAction,
    columns: Vec<ColumnDefinition>,
    csv: &str,
) -> CommitRequest<Cursor<Vec<u8>>> {
    CommitRequest {
        table_name: table.to_string(),
        action,
        columns,
        source_rows: source(csv),
    }
}

/// All rows of `table` in insertion order.
pub fn table_rows(store: &Store, table: &str) -> Vec<Vec<Value>> {
    let sql = format!("SELECT * FROM \"{table}\" ORDER BY rowid");
    let mut stmt = store.connection().prepare(&sql).expect("prepare select");
    let width = stmt.column_count();
    stmt.query_map([], |row| {
        (0..width)
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<rusqlite::Result<Vec<_>>>()
    })
    .expect("query rows")
    .collect::<rusqlite::Result<Vec<_>>>()
    .expect("read rows")
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
