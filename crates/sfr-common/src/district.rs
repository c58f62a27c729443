//! Destination district canonicalization
//!
//! The delivery zone is a small closed set of districts. Carrier exports
//! spell them inconsistently ("ROXANA", "distrito: la rita", "Jiménez"
//! without the accent already stripped upstream), so matching is a
//! normalized substring test against the canonical names.

/// Canonical district names, exactly as persisted.
pub const CANONICAL_DISTRICTS: [&str; 5] =
    ["La colonia", "Jimenez", "Colorado", "La Rita", "Roxana"];

/// Sentinel bag seal / district name for rows that arrive without markers.
pub const PENDING: &str = "PENDIENTE";

/// Resolve free text to a canonical district name.
///
/// The input is lowercased and whitespace-collapsed, then tested for each
/// canonical name as a substring, so surrounding text is tolerated.
/// Returns `None` when no canonical name (or the sentinel) is found.
pub fn canonical_district(raw: &str) -> Option<&'static str> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return None;
    }
    for canonical in CANONICAL_DISTRICTS {
        if normalized.contains(&canonical.to_lowercase()) {
            return Some(canonical);
        }
    }
    if normalized.contains("pendiente") {
        return Some(PENDING);
    }
    None
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
