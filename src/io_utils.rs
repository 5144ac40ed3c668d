//! Reader construction, delimiter and encoding resolution.
//!
//! Input always arrives as an explicit delimiter and an optional encoding
//! label; nothing here sniffs the file. `-` as a path reads from stdin.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Builds a reader that skips blanks ahead of each field and otherwise keeps
/// every field as written.
///
/// Width checks are left to [`crate::rows::RowSource`] so a bad row can be
/// reported with its data-row index instead of a csv byte position.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<LeadingBlankSkipper<R>>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(LeadingBlankSkipper::new(reader, delimiter))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    /// A `"` inside a quoted field: either the close or half of `""`.
    QuoteInQuoted,
}

impl FieldState {
    /// Advances over `byte`; `false` means the byte is dropped.
    fn accept(&mut self, byte: u8, delimiter: u8) -> bool {
        let ends_field = byte == delimiter || byte == b'\n' || byte == b'\r';
        match *self {
            FieldState::Start if ends_field => true,
            FieldState::Start if byte == b' ' || byte == b'\t' => false,
            FieldState::Start if byte == b'"' => {
                *self = FieldState::Quoted;
                true
            }
            FieldState::Start => {
                *self = FieldState::Unquoted;
                true
            }
            FieldState::Unquoted | FieldState::QuoteInQuoted if ends_field => {
                *self = FieldState::Start;
                true
            }
            FieldState::Unquoted => true,
            FieldState::Quoted => {
                if byte == b'"' {
                    *self = FieldState::QuoteInQuoted;
                }
                true
            }
            FieldState::QuoteInQuoted => {
                *self = if byte == b'"' {
                    FieldState::Quoted
                } else {
                    FieldState::Unquoted
                };
                true
            }
        }
    }
}

/// Drops spaces and tabs at the start of every unquoted position where a
/// field begins, so `1, "a, b"` opens a quoted field after the blank.
///
/// Bytes are inspected one at a time, which holds for ASCII-compatible
/// encodings. A blank used as the delimiter is never dropped.
pub struct LeadingBlankSkipper<R> {
    inner: R,
    delimiter: u8,
    state: FieldState,
    scratch: Vec<u8>,
}

impl<R: Read> LeadingBlankSkipper<R> {
    pub fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: FieldState::Start,
            scratch: Vec::new(),
        }
    }
}

impl<R: Read> Read for LeadingBlankSkipper<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.scratch.resize(out.len(), 0);
        loop {
            let read = self.inner.read(&mut self.scratch)?;
            if read == 0 {
                return Ok(0);
            }
            let mut written = 0;
            for &byte in &self.scratch[..read] {
                if self.state.accept(byte, self.delimiter) {
                    out[written] = byte;
                    written += 1;
                }
            }
            if written > 0 {
                return Ok(written);
            }
        }
    }
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
