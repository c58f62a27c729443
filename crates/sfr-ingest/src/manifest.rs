//! Manifest parser
//!
//! Receiving manifests are spreadsheets exported to delimited text: a header
//! row, then one row per receiving line. A row names a bag seal number, a
//! destination district and one or more tracking codes, but real sheets are
//! messy: markers drift into unlabeled columns, several tracking codes share
//! a cell, and footer noise follows the data.
//!
//! The parser resolves columns by header alias, falls back to scanning whole
//! rows for marker-shaped cells, extracts every tracking token per row, and
//! stops once three consecutive rows yield no tracking at all. When the same
//! tracking code appears twice the later row wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use sfr_common::district::{canonical_district, PENDING};
use sfr_common::tracking::{is_seal_number, looks_like_tracking, scan_identifier_tokens};

use crate::grid::Grid;
use crate::text::{non_blank, parse_flexible_timestamp};

const DATE_ALIASES: [&str; 1] = ["FECHA"];
const TRACKING_ALIASES: [&str; 1] = ["TRACKING"];
const SEAL_ALIASES: [&str; 1] = ["MARCHAMO"];
const DISTRICT_ALIASES: [&str; 6] =
    ["DISTRITO", "DISTRICT", "ZONA", "UBICACION", "UBICACIÓN", "MUEBLE"];
const RESPONSIBLE_ALIASES: [&str; 2] = ["RESPONSABLE", "RESP"];
const OBSERVATION_ALIASES: [&str; 5] =
    ["OBSERVACIONES", "OBSERVACION", "OBS", "NOTAS", "NOTA"];

/// How many data rows the tracking-column heuristic inspects.
const DETECTION_ROW_LIMIT: usize = 200;
const DETECTION_COL_LIMIT: usize = 30;

/// One deduplicated receiving line.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    /// Uppercased tracking token as found on the sheet
    pub tracking: String,
    pub seal: Option<String>,
    pub district: Option<&'static str>,
    pub received_at: Option<DateTime<Utc>>,
    pub responsible: Option<String>,
    pub observations: Option<String>,
}

impl ManifestEntry {
    /// A row "has markers" when it carried both a usable seal and a real
    /// district, not the pending sentinel.
    pub fn has_markers(&self) -> bool {
        self.seal.is_some() && self.district.is_some_and(|d| d != PENDING)
    }
}

/// Parse result: entries in first-appearance order, later duplicates folded in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedManifest {
    pub entries: Vec<ManifestEntry>,
    /// Data rows inspected before termination (header excluded)
    pub rows_scanned: usize,
}

impl ParsedManifest {
    pub fn with_markers(&self) -> usize {
        self.entries.iter().filter(|e| e.has_markers()).count()
    }

    pub fn without_markers(&self) -> usize {
        self.entries.len() - self.with_markers()
    }
}

#[derive(Debug, Default)]
struct Columns {
    date: usize,
    tracking: Option<usize>,
    seal: Option<usize>,
    district: Option<usize>,
    responsible: Option<usize>,
    observations: Option<usize>,
}

/// Parser for receiving manifests.
#[derive(Debug, Default)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, grid: &Grid) -> ParsedManifest {
        if grid.is_empty() {
            return ParsedManifest::default();
        }

        let columns = self.resolve_columns(grid);
        debug!(?columns, "manifest columns resolved");

        // first position wins for order, last row wins for content
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut rows_scanned = 0;

        for row in 1..grid.row_count() {
            rows_scanned += 1;

            let trackings = self.row_trackings(grid, row, &columns);
            if trackings.is_empty() {
                if self.row_trackings(grid, row + 1, &columns).is_empty()
                    && self.row_trackings(grid, row + 2, &columns).is_empty()
                {
                    debug!(row, "three tracking-less rows, stopping manifest scan");
                    break;
                }
                continue;
            }

            let seal = self.row_seal(grid, row, &columns);
            let district = self.row_district(grid, row, &columns);
            let received_at = parse_flexible_timestamp(grid.cell(row, columns.date));
            let responsible = columns
                .responsible
                .and_then(|c| non_blank(grid.cell(row, c)))
                .map(str::to_string);
            let observations = columns
                .observations
                .and_then(|c| non_blank(grid.cell(row, c)))
                .map(str::to_string);

            for tracking in trackings {
                let entry = ManifestEntry {
                    tracking: tracking.clone(),
                    seal: seal.clone(),
                    district,
                    received_at,
                    responsible: responsible.clone(),
                    observations: observations.clone(),
                };
                match index.get(&tracking) {
                    Some(&at) => entries[at] = entry,
                    None => {
                        index.insert(tracking, entries.len());
                        entries.push(entry);
                    },
                }
            }
        }

        ParsedManifest {
            entries,
            rows_scanned,
        }
    }

    fn resolve_columns(&self, grid: &Grid) -> Columns {
        let header = &grid.rows()[0];
        Columns {
            date: find_column(header, &DATE_ALIASES).unwrap_or(0),
            tracking: find_column(header, &TRACKING_ALIASES)
                .or_else(|| self.detect_tracking_column(grid)),
            seal: find_column(header, &SEAL_ALIASES),
            district: find_column(header, &DISTRICT_ALIASES),
            responsible: find_column(header, &RESPONSIBLE_ALIASES),
            observations: find_column(header, &OBSERVATION_ALIASES),
        }
    }

    /// Without a TRACKING header, pick the column whose first rows carry the
    /// most tracking-shaped cells.
    fn detect_tracking_column(&self, grid: &Grid) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for col in 0..DETECTION_COL_LIMIT {
            let mut score = 0;
            for row in 1..grid.row_count().min(DETECTION_ROW_LIMIT + 1) {
                if looks_like_tracking(grid.cell(row, col)) {
                    score += 1;
                }
            }
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((col, score));
            }
        }
        best.map(|(col, _)| col)
    }

    fn row_trackings(&self, grid: &Grid, row: usize, columns: &Columns) -> Vec<String> {
        if row >= grid.row_count() {
            return Vec::new();
        }
        if let Some(col) = columns.tracking {
            let tokens = scan_identifier_tokens(grid.cell(row, col));
            if !tokens.is_empty() {
                return tokens;
            }
        }
        let joined = grid.rows()[row].join(" ");
        scan_identifier_tokens(&joined)
    }

    fn row_seal(&self, grid: &Grid, row: usize, columns: &Columns) -> Option<String> {
        if let Some(col) = columns.seal {
            let cell = grid.cell(row, col).trim();
            if is_seal_number(cell) {
                return Some(cell.to_string());
            }
        }
        // fall back to the first seal-shaped cell anywhere in the row
        grid.rows()[row]
            .iter()
            .find(|cell| is_seal_number(cell))
            .map(|cell| cell.trim().to_string())
    }

    fn row_district(&self, grid: &Grid, row: usize, columns: &Columns) -> Option<&'static str> {
        if let Some(col) = columns.district {
            if let Some(d) = canonical_district(grid.cell(row, col)) {
                return Some(d);
            }
        }
        grid.rows()[row]
            .iter()
            .find_map(|cell| canonical_district(cell))
    }
}

fn find_column(header: &[String], aliases: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let normalized = cell.trim().to_uppercase();
        !normalized.is_empty() && aliases.iter().any(|a| normalized.contains(a))
    })
}
