//! Aligned plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

const DEFAULT_MAX_CELL_WIDTH: usize = 40;
const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    max_cell_width: usize,
}

impl TextTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            max_cell_width: DEFAULT_MAX_CELL_WIDTH,
        }
    }

    pub fn with_max_cell_width(mut self, width: usize) -> Self {
        self.max_cell_width = width.max(1);
        self
    }

    /// Adds a row; missing cells render blank and extra cells are dropped.
    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        let mut row = cells.into_iter().map(Into::into).collect::<Vec<String>>();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let headers = self
            .headers
            .iter()
            .map(|h| self.fit(h))
            .collect::<Vec<_>>();
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| self.fit(cell)).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let mut widths = headers
            .iter()
            .map(|h| h.chars().count().max(3))
            .collect::<Vec<_>>();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", format_row(&headers, &widths));
        let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", format_row(&separator, &widths));
        for row in &rows {
            let _ = writeln!(output, "{}", format_row(row, &widths));
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }

    fn fit(&self, value: &str) -> String {
        let flattened = flatten_whitespace(value);
        if flattened.chars().count() <= self.max_cell_width {
            return flattened.into_owned();
        }
        let mut truncated = flattened
            .chars()
            .take(self.max_cell_width - 1)
            .collect::<String>();
        truncated.push(ELLIPSIS);
        truncated
    }
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line
}

fn flatten_whitespace(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_aligned_and_trailing_space_trimmed() {
        let mut table = TextTable::new(["id", "name"]);
        table.push_row(["1", "Alice"]);
        table.push_row(["22", "Bob"]);
        assert_eq!(
            table.render(),
            "id   name\n---  -----\n1    Alice\n22   Bob\n"
        );
    }

    #[test]
    fn long_and_multiline_cells_are_fitted() {
        let mut table = TextTable::new(["note"]).with_max_cell_width(5);
        table.push_row(["line one\nline two"]);
        table.push_row(Vec::<String>::new());
        let rendered = table.render();
        assert!(rendered.contains("line…"));
        assert_eq!(rendered.lines().count(), 4);
    }
}
