//! Streaming row source over a CSV byte stream.
//!
//! [`RowSource`] reads the header on open and then yields one [`Row`] per
//! data record, lazily and in file order. A record whose width differs from
//! the header fails with [`IngestError::MalformedRow`]; only
//! [`RowSource::read_preview()`] pads or truncates, for display purposes.

use std::io::Read;

use csv::ByteRecord;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::{IngestError, Result},
    io_utils::{self, LeadingBlankSkipper},
};

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position among data rows (the header is row 0).
    pub index: usize,
    pub cells: Vec<String>,
}

pub struct RowSource<R: Read> {
    reader: csv::Reader<LeadingBlankSkipper<R>>,
    encoding: &'static Encoding,
    headers: Vec<String>,
    record: ByteRecord,
    rows_read: usize,
    finished: bool,
}

impl<R: Read> RowSource<R> {
    pub fn open(input: R, options: &ReadOptions) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(input, options.delimiter);
        let mut record = ByteRecord::new();
        let has_header = reader
            .read_byte_record(&mut record)
            .map_err(|source| IngestError::Csv { row: 0, source })?;
        let blank_header = record.len() <= 1 && record.iter().all(|field| field.is_empty());
        if !has_header || blank_header {
            return Err(IngestError::EmptyInput);
        }
        let mut headers = decode_fields(&record, options.encoding, 0)?;
        if let Some(first) = headers.first_mut().filter(|h| h.starts_with(BYTE_ORDER_MARK)) {
            first.remove(0);
        }
        debug!("Opened CSV with {} header column(s)", headers.len());
        Ok(Self {
            reader,
            encoding: options.encoding,
            headers,
            record,
            rows_read: 0,
            finished: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Reads the next data row; `Ok(None)` marks the end of the stream.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        match self.next_fields()? {
            None => Ok(None),
            Some(cells) => {
                let index = self.rows_read;
                if cells.len() != self.headers.len() {
                    return Err(IngestError::MalformedRow {
                        row: index,
                        expected: self.headers.len(),
                        found: cells.len(),
                    });
                }
                Ok(Some(Row { index, cells }))
            }
        }
    }

    /// Reads up to `max_rows` rows for display, fitting each to the header width.
    pub fn read_preview(&mut self, max_rows: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while rows.len() < max_rows {
            let Some(mut cells) = self.next_fields()? else {
                break;
            };
            cells.resize(self.headers.len(), String::new());
            rows.push(Row {
                index: self.rows_read,
                cells,
            });
        }
        Ok(rows)
    }

    fn next_fields(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }
        let row = self.rows_read + 1;
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|source| IngestError::Csv { row, source })?;
        if !more {
            self.finished = true;
            return Ok(None);
        }
        self.rows_read = row;
        decode_fields(&self.record, self.encoding, row).map(Some)
    }
}

impl<R: Read> Iterator for RowSource<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

fn decode_fields(
    record: &ByteRecord,
    encoding: &'static Encoding,
    row: usize,
) -> Result<Vec<String>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            io_utils::decode_bytes(field, encoding)
                .map(|text| text.trim_start().to_string())
                .ok_or(IngestError::Decode {
                    row,
                    column: idx + 1,
                    encoding: encoding.name(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn open(text: &str) -> Result<RowSource<Cursor<Vec<u8>>>> {
        RowSource::open(Cursor::new(text.as_bytes().to_vec()), &ReadOptions::default())
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_newlines() {
        let mut source = open("id,note\n1,\"a, b\"\n2,\"line one\nline two\"\n").unwrap();
        let first = source.next_row().unwrap().unwrap();
        assert_eq!(first.cells, ["1", "a, b"]);
        let second = source.next_row().unwrap().unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.cells[1], "line one\nline two");
        assert!(source.next_row().unwrap().is_none());
        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn leading_whitespace_is_trimmed() {
        let mut source = open("id, name\n1,  Alice\n").unwrap();
        assert_eq!(source.headers(), ["id", "name"]);
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.cells, ["1", "Alice"]);
    }

    #[test]
    fn blank_before_quote_still_opens_quoted_field() {
        let mut source = open("id, note\n1, \"a, b\"\n2,\t\"x\"\"y\"\n").unwrap();
        assert_eq!(source.headers(), ["id", "note"]);
        assert_eq!(source.next_row().unwrap().unwrap().cells, ["1", "a, b"]);
        assert_eq!(source.next_row().unwrap().unwrap().cells, ["2", "x\"y"]);
    }

    #[test]
    fn width_mismatch_reports_row_index() {
        let mut source = open("a,b\n1,2\n3\n").unwrap();
        assert!(source.next_row().unwrap().is_some());
        match source.next_row() {
            Err(IngestError::MalformedRow {
                row,
                expected,
                found,
            }) => {
                assert_eq!((row, expected, found), (2, 2, 1));
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn preview_pads_short_rows() {
        let mut source = open("a,b,c\n1\n1,2,3,4\n").unwrap();
        let rows = source.read_preview(10).unwrap();
        assert_eq!(rows[0].cells, ["1", "", ""]);
        assert_eq!(rows[1].cells, ["1", "2", "3"]);
    }

    #[test]
    fn empty_input_is_reported() {
        assert!(matches!(open(""), Err(IngestError::EmptyInput)));
        assert!(matches!(open("\n"), Err(IngestError::EmptyInput)));
    }

    #[test]
    fn byte_order_mark_is_dropped_from_first_header() {
        let source = open("\u{feff}id,name\n").unwrap();
        assert_eq!(source.headers(), ["id", "name"]);
    }

    #[test]
    fn header_only_input_yields_no_rows() {
        let mut source = open("a,b\n").unwrap();
        assert!(source.next().is_none());
        assert_eq!(source.rows_read(), 0);
    }
}
