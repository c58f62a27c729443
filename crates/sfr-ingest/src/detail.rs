//! Detail feed parser
//!
//! The carrier's per-parcel export: one row per parcel with recipient data
//! and the carrier's own status text. Headers vary by export template and
//! language, so every field is resolved through an alias list. Rows that
//! yield no valid tracking code are rejected with their row number;
//! rejection never stops the parse.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use sfr_common::district::canonical_district;
use sfr_common::tracking::{
    extract_tracking_codes, looks_like_tracking, scan_identifier_tokens, TrackingCode,
};

use crate::grid::Grid;
use crate::text::{non_blank, normalize_phone, parse_flexible_decimal, parse_flexible_timestamp};

const TRACKING_ALIASES: [&str; 10] = [
    "AEROTRACK",
    "COURIER_NUMBER",
    "AWB",
    "TRK_BAGNUM",
    "TRACKING",
    "TRACKING_NUMBER",
    "NUMERO DE ENVIO",
    "NUMERO_DE_ENVIO",
    "CÓDIGO ENVÍO",
    "CODIGO ENVIO",
];
const NAME_ALIASES: [&str; 4] = ["CLIENT_NAME", "CONSIGNEE", "NOMBRE", "NAME"];
const ADDRESS_ALIASES: [&str; 4] = ["THIRDPARTY_ADDRESS", "DIRECCION", "DIRECCIÓN", "ADDRESS"];
const PHONE_ALIASES: [&str; 4] = ["THIRDPARTY_PHONE", "TELEFONO", "TELÉFONO", "PHONE"];
const VALUE_ALIASES: [&str; 4] = ["MERCHANDISE_VALUE", "VALOR_MERCANCIA", "VALOR", "VALUE"];
const VALUE_FALLBACK_ALIASES: [&str; 1] = ["DECLARED_VALUE"];
const CONTENT_ALIASES: [&str; 4] =
    ["DESCRIPTION", "DESCRIPCION", "CONTENT_DESCRIPTION", "CONTENIDO"];
const STATUS_ALIASES: [&str; 2] = ["STATUS", "ESTADO"];
const DATE_ALIASES: [&str; 5] = [
    "LAST_UPDATE",
    "LAST UPDATE",
    "FECHA ULTIMA ACTUALIZACION",
    "FECHA_ULTIMA_ACTUALIZACION",
    "FECHA",
];
const DISTRICT_ALIASES: [&str; 3] = ["DISTRITO", "DISTRICT", "ZONA"];

/// One accepted feed row.
#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    /// 1-based row number in the source file (header is row 1)
    pub row_number: usize,
    /// Uppercased carrier-prefix code or broad identifier-shaped token
    pub tracking: String,
    pub recipient_name: Option<String>,
    pub recipient_address: Option<String>,
    pub recipient_phone: Option<String>,
    pub declared_value: Option<f64>,
    pub content_description: Option<String>,
    pub status: Option<String>,
    pub status_at: Option<DateTime<Utc>>,
    pub district: Option<&'static str>,
}

/// Parse result: accepted rows plus per-row rejection messages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedDetailFeed {
    pub rows: Vec<DetailRow>,
    pub rejected: Vec<String>,
}

#[derive(Debug, Default)]
struct Columns {
    tracking: Option<usize>,
    name: Option<usize>,
    address: Option<usize>,
    phone: Option<usize>,
    value: Option<usize>,
    content: Option<usize>,
    status: Option<usize>,
    date: Option<usize>,
    district: Option<usize>,
}

/// Parser for per-parcel detail feeds.
#[derive(Debug, Default)]
pub struct DetailFeedParser;

impl DetailFeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, grid: &Grid) -> ParsedDetailFeed {
        if grid.is_empty() {
            return ParsedDetailFeed::default();
        }

        let columns = self.resolve_columns(&grid.rows()[0]);
        debug!(?columns, "detail feed columns resolved");

        let mut result = ParsedDetailFeed::default();
        for row in 1..grid.row_count() {
            let row_number = row + 1;
            if grid.rows()[row].iter().all(|c| c.trim().is_empty()) {
                continue;
            }

            let Some(tracking) = self.row_tracking(grid, row, &columns) else {
                result
                    .rejected
                    .push(format!("row {row_number}: missing or invalid tracking code"));
                continue;
            };

            let cell = |col: Option<usize>| col.map(|c| grid.cell(row, c)).unwrap_or("");
            result.rows.push(DetailRow {
                row_number,
                tracking,
                recipient_name: non_blank(cell(columns.name)).map(str::to_string),
                recipient_address: non_blank(cell(columns.address)).map(str::to_string),
                recipient_phone: normalize_phone(cell(columns.phone)),
                declared_value: parse_flexible_decimal(cell(columns.value)),
                content_description: non_blank(cell(columns.content)).map(str::to_string),
                status: non_blank(cell(columns.status)).map(str::to_string),
                status_at: parse_flexible_timestamp(cell(columns.date)),
                district: canonical_district(cell(columns.district)),
            });
        }
        result
    }

    fn resolve_columns(&self, header: &[String]) -> Columns {
        Columns {
            tracking: find_column(header, &TRACKING_ALIASES),
            name: find_column(header, &NAME_ALIASES),
            address: find_column(header, &ADDRESS_ALIASES),
            phone: find_column(header, &PHONE_ALIASES),
            value: find_column(header, &VALUE_ALIASES)
                .or_else(|| find_column(header, &VALUE_FALLBACK_ALIASES)),
            content: find_column(header, &CONTENT_ALIASES),
            status: find_column(header, &STATUS_ALIASES),
            date: find_column(header, &DATE_ALIASES),
            district: find_column(header, &DISTRICT_ALIASES),
        }
    }

    /// The tracking column when known, otherwise the first carrier-prefix
    /// code found anywhere in the row, otherwise the first broad
    /// identifier-shaped token.
    fn row_tracking(&self, grid: &Grid, row: usize, columns: &Columns) -> Option<String> {
        if let Some(col) = columns.tracking {
            let cell = grid.cell(row, col);
            if let Ok(code) = TrackingCode::parse(cell) {
                return Some(code.into_inner());
            }
            if looks_like_tracking(cell) {
                if let Some(token) = scan_identifier_tokens(cell).into_iter().next() {
                    return Some(token);
                }
            }
        }
        let joined = grid.rows()[row].join(" ");
        if let Some(code) = extract_tracking_codes(&joined).into_iter().next() {
            return Some(code.into_inner());
        }
        scan_identifier_tokens(&joined).into_iter().next()
    }
}

fn find_column(header: &[String], aliases: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let normalized = cell.trim().to_uppercase();
        !normalized.is_empty() && aliases.iter().any(|a| normalized.contains(a))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_standard_export() {
        let g = grid(&[
            &["AEROTRACK", "CLIENT_NAME", "THIRDPARTY_PHONE", "STATUS", "LAST_UPDATE"],
            &["HZCR100", "Ana Mora", "8888-1234", "Entregado", "03/01/2025 10:00:00"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert!(parsed.rejected.is_empty());
        let row = &parsed.rows[0];
        assert_eq!(row.tracking.as_str(), "HZCR100");
        assert_eq!(row.recipient_name.as_deref(), Some("Ana Mora"));
        assert_eq!(row.recipient_phone.as_deref(), Some("+50688881234"));
        assert_eq!(row.status.as_deref(), Some("Entregado"));
        assert!(row.status_at.is_some());
    }

    #[test]
    fn test_spanish_headers() {
        let g = grid(&[
            &["NUMERO DE ENVIO", "NOMBRE", "DIRECCION", "VALOR", "CONTENIDO"],
            &["cr555", "Luis Soto", "200m norte iglesia", "1.234,00", "ropa"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        let row = &parsed.rows[0];
        assert_eq!(row.tracking.as_str(), "CR555");
        assert_eq!(row.recipient_address.as_deref(), Some("200m norte iglesia"));
        assert_eq!(row.content_description.as_deref(), Some("ropa"));
    }

    #[test]
    fn test_invalid_tracking_rejected_with_row_number() {
        let g = grid(&[
            &["TRACKING", "STATUS"],
            &["HZCR1", "ok"],
            &["XYZ999", "ok"],
            &["HZCR2", "ok"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rejected.len(), 1);
        assert!(parsed.rejected[0].starts_with("row 3:"));
    }

    #[test]
    fn test_tracking_recovered_from_any_cell() {
        let g = grid(&[
            &["A", "B"],
            &["algo", "ver HZCR42 pendiente"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert_eq!(parsed.rows[0].tracking.as_str(), "HZCR42");
    }

    #[test]
    fn test_broad_identifier_accepted_as_tracking() {
        // other-carrier codes have no HZCR/CR prefix but still identify rows
        let g = grid(&[
            &["A", "B"],
            &["algo", "ABQ12345678"],
            &["TRK_BAGNUM: JJD0099887766", "x"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.rows[0].tracking, "ABQ12345678");
        assert_eq!(parsed.rows[1].tracking, "JJD0099887766");
    }

    #[test]
    fn test_blank_rows_skipped_silently() {
        let g = grid(&[
            &["TRACKING"],
            &[""],
            &["HZCR1"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_district_preserved_as_none_when_unrecognized() {
        let g = grid(&[
            &["TRACKING", "DISTRITO"],
            &["HZCR1", "Roxana"],
            &["HZCR2", "Monteverde"],
            &["HZCR3", ""],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert_eq!(parsed.rows[0].district, Some("Roxana"));
        assert_eq!(parsed.rows[1].district, None);
        assert_eq!(parsed.rows[2].district, None);
    }

    #[test]
    fn test_declared_value_fallback_column() {
        let g = grid(&[
            &["TRACKING", "DECLARED_VALUE"],
            &["HZCR1", "45.50"],
        ]);
        let parsed = DetailFeedParser::new().parse(&g);
        assert_eq!(parsed.rows[0].declared_value, Some(45.5));
    }
}
