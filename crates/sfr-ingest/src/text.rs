//! Field normalization helpers shared by the manifest and detail parsers

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Timestamp formats seen in carrier exports, tried in order.
const TIMESTAMP_FORMATS: [&str; 3] = ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

/// Parse a timestamp cell, trying day-first formats before ISO ones.
/// Naive values are interpreted as UTC. Returns `None` when no format fits.
pub fn parse_flexible_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

/// Normalize a phone cell to the +506 form used locally.
///
/// Strips everything but digits and '+'. Bare 8-digit numbers get the
/// country code; 506-prefixed 11-digit numbers get the '+'. Anything else
/// is returned stripped but otherwise untouched.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if stripped.is_empty() {
        return None;
    }
    if stripped.contains('+') {
        return Some(stripped);
    }
    if stripped.len() == 8 {
        return Some(format!("+506{stripped}"));
    }
    if stripped.len() == 11 && stripped.starts_with("506") {
        return Some(format!("+{stripped}"));
    }
    Some(stripped)
}

/// Parse a monetary cell tolerating either decimal separator.
///
/// Currency symbols and spaces are stripped. A single comma with no period
/// is a decimal comma; otherwise commas are thousands separators.
pub fn parse_flexible_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.matches(',').count() == 1 && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };
    normalized.parse::<f64>().ok()
}

/// Trimmed cell content, `None` when blank.
pub fn non_blank(raw: &str) -> Option<&str> {
    let t = raw.trim();
    (!t.is_empty()).then_some(t)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_timestamp_day_first() {
        let ts = parse_flexible_timestamp("03/01/2025 14:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-03T14:30:00+00:00");
    }

    #[test]
    fn test_timestamp_short_time() {
        let ts = parse_flexible_timestamp("03/01/2025 14:30").unwrap();
        assert_eq!(ts.hour(), 14);
    }

    #[test]
    fn test_timestamp_date_only() {
        let ts = parse_flexible_timestamp("2025-01-03").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-03T00:00:00+00:00");
    }

    #[test]
    fn test_timestamp_iso_datetime() {
        assert!(parse_flexible_timestamp("2025-01-03 08:00:00").is_some());
    }

    #[test]
    fn test_timestamp_garbage() {
        assert!(parse_flexible_timestamp("mañana").is_none());
        assert!(parse_flexible_timestamp("").is_none());
    }

    #[test]
    fn test_phone_local_eight_digits() {
        assert_eq!(normalize_phone("8888-1234").unwrap(), "+50688881234");
    }

    #[test]
    fn test_phone_with_country_prefix() {
        assert_eq!(normalize_phone("506 8888 1234").unwrap(), "+50688881234");
    }

    #[test]
    fn test_phone_already_international() {
        assert_eq!(normalize_phone("+506 8888-1234").unwrap(), "+50688881234");
    }

    #[test]
    fn test_phone_unrecognized_shape_passes_through() {
        assert_eq!(normalize_phone("12345").unwrap(), "12345");
        assert!(normalize_phone("sin telefono").is_none());
    }

    #[test]
    fn test_decimal_comma_separator() {
        assert_eq!(parse_flexible_decimal("1234,56").unwrap(), 1234.56);
    }

    #[test]
    fn test_decimal_thousands_commas() {
        assert_eq!(parse_flexible_decimal("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_flexible_decimal("$12,000").unwrap(), 12000.0);
    }

    #[test]
    fn test_decimal_garbage() {
        assert!(parse_flexible_decimal("N/A").is_none());
        assert!(parse_flexible_decimal("").is_none());
    }
}
