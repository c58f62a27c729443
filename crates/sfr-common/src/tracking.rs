//! Tracking code validation and extraction
//!
//! Tracking codes are the `HZCR...`/`CR...` identifiers printed on parcel
//! labels: the literal prefix followed by digits. Operators paste them into
//! free text (WhatsApp dumps, scanner output), and carrier exports carry
//! them in arbitrary columns, so this module also provides the heuristics
//! the import pipeline uses to find identifier-shaped tokens in cells.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SfrError;

static VALID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(?i:(?:HZCR|CR)\d+)$").unwrap()
});

static EXTRACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)(?:HZCR|CR)\d+").unwrap()
});

/// Broad identifier-shaped token: 2-4 letters then 6-18 alphanumerics.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)\b[A-Z]{2,4}[A-Z0-9]{6,18}\b").unwrap()
});

static SEAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d{4,}$").unwrap()
});

/// Column labels that produce tracking-shaped tokens but never are ones.
const RESERVED_PREFIXES: [&str; 3] = ["MUEBLE", "CAJA", "DISTRITO"];

/// A validated, uppercase tracking code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingCode(String);

impl TrackingCode {
    /// Parse and normalize a tracking code.
    ///
    /// Accepts any casing and surrounding whitespace; stores uppercase.
    pub fn parse(raw: &str) -> Result<Self, SfrError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SfrError::Validation("tracking code is empty".into()));
        }
        if !VALID_RE.is_match(trimmed) {
            return Err(SfrError::Validation(format!(
                "invalid tracking code: {trimmed}"
            )));
        }
        Ok(TrackingCode(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingCode {
    type Error = SfrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TrackingCode::parse(&value)
    }
}

impl From<TrackingCode> for String {
    fn from(code: TrackingCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for TrackingCode {
    type Err = SfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackingCode::parse(s)
    }
}

/// Extract every tracking code from free text, first occurrence order,
/// deduplicated after uppercasing. Returns an empty vector when nothing
/// matches; extraction never fails.
pub fn extract_tracking_codes(text: &str) -> Vec<TrackingCode> {
    let mut seen = std::collections::HashSet::new();
    let mut codes = Vec::new();
    for m in EXTRACT_RE.find_iter(text) {
        let code = m.as_str().to_uppercase();
        if seen.insert(code.clone()) {
            codes.push(TrackingCode(code));
        }
    }
    codes
}

/// Scan a spreadsheet cell for broad identifier-shaped tokens. Looser than
/// [`extract_tracking_codes`]: manifests sometimes carry codes from other
/// carriers that still need to be treated as tracking candidates.
pub fn scan_identifier_tokens(cell: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(cell)
        .map(|m| m.as_str().to_uppercase())
        .filter(|t| !RESERVED_PREFIXES.iter().any(|p| t.starts_with(p)))
        .collect()
}

/// Cheap cell-level test used when hunting for the tracking column:
/// plausible length, not a bare number, not a known column label.
pub fn looks_like_tracking(cell: &str) -> bool {
    let t = cell.trim();
    if t.len() < 8 || t.len() > 24 {
        return false;
    }
    if t.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let upper = t.to_uppercase();
    !RESERVED_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// True when the whole cell is a seal number: a bare digit run of length 4+.
pub fn is_seal_number(cell: &str) -> bool {
    SEAL_RE.is_match(cell.trim())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_prefixes() {
        assert_eq!(TrackingCode::parse("HZCR12345").unwrap().as_str(), "HZCR12345");
        assert_eq!(TrackingCode::parse("CR987").unwrap().as_str(), "CR987");
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(TrackingCode::parse("  hzcr0042 ").unwrap().as_str(), "HZCR0042");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TrackingCode::parse("").is_err());
        assert!(TrackingCode::parse("HZCR").is_err());
        assert!(TrackingCode::parse("XX12345").is_err());
        assert!(TrackingCode::parse("HZCR123X").is_err());
        assert!(TrackingCode::parse("123456").is_err());
    }

    #[test]
    fn test_extract_ordered_dedup() {
        let codes =
            extract_tracking_codes("llegaron hzcr111 y CR22, luego HZCR111 de nuevo");
        let strs: Vec<_> = codes.iter().map(TrackingCode::as_str).collect();
        assert_eq!(strs, vec!["HZCR111", "CR22"]);
    }

    #[test]
    fn test_extract_empty_text() {
        assert!(extract_tracking_codes("sin codigos aqui").is_empty());
    }

    #[test]
    fn test_scan_tokens_skips_reserved_labels() {
        let tokens = scan_identifier_tokens("MUEBLE12 HZCR12345 ab12345678");
        assert_eq!(tokens, vec!["HZCR12345", "AB12345678"]);
    }

    #[test]
    fn test_looks_like_tracking() {
        assert!(looks_like_tracking("HZCR12345"));
        assert!(looks_like_tracking("AWB1234567890"));
        assert!(!looks_like_tracking("1234567890")); // all digits
        assert!(!looks_like_tracking("CR12")); // too short
        assert!(!looks_like_tracking("distrito Roxana")); // column label
    }

    #[test]
    fn test_is_seal_number() {
        assert!(is_seal_number("12345"));
        assert!(is_seal_number(" 9001 "));
        assert!(!is_seal_number("123"));
        assert!(!is_seal_number("12A45"));
    }

    #[test]
    fn test_serde_round_trip() {
        let code = TrackingCode::parse("hzcr55").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"HZCR55\"");
        let back: TrackingCode = serde_json::from_str("\"cr777\"").unwrap();
        assert_eq!(back.as_str(), "CR777");
        assert!(serde_json::from_str::<TrackingCode>("\"nope\"").is_err());
    }
}
