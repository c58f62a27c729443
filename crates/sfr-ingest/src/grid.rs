//! Cell grid abstraction over delimited input
//!
//! Both import modes operate on a plain grid of string cells. The grid is
//! built from raw bytes: charset is recovered with
//! [`crate::decode::decode_best_effort`], the delimiter is sniffed from the
//! header line, and the `csv` reader is run in flexible mode so ragged rows
//! survive.

use anyhow::{Context, Result};

use crate::decode::decode_best_effort;

/// A rectangular-ish table of trimmed-on-read string cells.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Build a grid directly from rows (tests and callers that already
    /// decoded a spreadsheet).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Parse delimited bytes: decode charset, sniff delimiter, read rows.
    pub fn from_delimited_bytes(bytes: &[u8]) -> Result<Self> {
        let text = decode_best_effort(bytes);
        let header = text.lines().next().unwrap_or_default();
        let delimiter = detect_delimiter(header);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("Failed to read delimited record")?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell content, empty string for anything out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Sniff the delimiter from the header line. Semicolon wins when it is at
/// least as frequent as the alternatives, then comma, then tab.
pub fn detect_delimiter(header: &str) -> u8 {
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    let tabs = header.matches('\t').count();

    if semicolons > 0 && semicolons >= commas && semicolons >= tabs {
        b';'
    } else if commas > 0 && commas >= tabs {
        b','
    } else {
        b'\t'
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("A;B;C"), b';');
        assert_eq!(detect_delimiter("A,B,C"), b',');
        assert_eq!(detect_delimiter("A\tB\tC"), b'\t');
        // semicolon wins ties
        assert_eq!(detect_delimiter("A;B,C"), b';');
        // no delimiter at all falls back to tab
        assert_eq!(detect_delimiter("SINGLE"), b'\t');
    }

    #[test]
    fn test_from_delimited_bytes_semicolon() {
        let grid = Grid::from_delimited_bytes(b"TRACKING;STATUS\nHZCR1;Entregado\n").unwrap();
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.cell(1, 0), "HZCR1");
        assert_eq!(grid.cell(1, 1), "Entregado");
    }

    #[test]
    fn test_ragged_rows_tolerated() {
        let grid = Grid::from_delimited_bytes(b"A,B,C\n1,2\n1,2,3,4\n").unwrap();
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.cell(1, 2), "");
        assert_eq!(grid.cell(2, 3), "4");
    }

    #[test]
    fn test_out_of_range_cell_is_empty() {
        let grid = Grid::from_rows(vec![vec!["x".into()]]);
        assert_eq!(grid.cell(5, 5), "");
    }
}
