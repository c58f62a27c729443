//! Best-effort character decoding
//!
//! Carrier exports arrive as UTF-8, Windows-1252 or ISO-8859-1 depending on
//! which desktop tool produced them, with no declared charset. Each
//! candidate decoding is scored by how much damage it shows (replacement
//! characters, classic "Ã"/"Â" mojibake sequences) and the least damaged
//! one wins, UTF-8 first on ties.

/// Penalty weight for a replacement character. A single U+FFFD is stronger
/// evidence of a wrong decoding than one mojibake marker.
const REPLACEMENT_PENALTY: usize = 5;

/// Decode raw bytes, picking the candidate charset with the lowest damage
/// score. Never fails; worst case the UTF-8 lossy decoding is returned.
pub fn decode_best_effort(bytes: &[u8]) -> String {
    let utf8 = String::from_utf8_lossy(bytes).into_owned();
    let cp1252 = decode_cp1252(bytes);
    let latin1 = decode_latin1(bytes);

    // Candidate order breaks ties: prefer UTF-8, then Windows-1252.
    let mut best = utf8;
    let mut best_score = damage_score(&best);
    for candidate in [cp1252, latin1] {
        let score = damage_score(&candidate);
        if score < best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}

fn damage_score(text: &str) -> usize {
    let replacements = text.matches('\u{FFFD}').count();
    let mojibake = text.matches('Ã').count() + text.matches('Â').count();
    replacements * REPLACEMENT_PENALTY + mojibake
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn decode_cp1252(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| cp1252_char(b)).collect()
}

/// Windows-1252 differs from Latin-1 only in the 0x80-0x9F range.
/// Unassigned bytes decode to U+FFFD so they count as damage.
fn cp1252_char(b: u8) -> char {
    match b {
        0x80 => '\u{20AC}', // euro sign
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => '\u{FFFD}',
        other => other as char,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii() {
        assert_eq!(decode_best_effort(b"TRACKING,STATUS"), "TRACKING,STATUS");
    }

    #[test]
    fn test_valid_utf8_wins() {
        let text = "Jiménez, dirección";
        assert_eq!(decode_best_effort(text.as_bytes()), text);
    }

    #[test]
    fn test_latin1_accents_recovered() {
        // "Jiménez" in ISO-8859-1: é = 0xE9
        let bytes = b"Jim\xE9nez";
        assert_eq!(decode_best_effort(bytes), "Jiménez");
    }

    #[test]
    fn test_cp1252_specifics() {
        // 0x93/0x94 are curly quotes in Windows-1252, control chars in Latin-1
        let bytes = b"\x93La Rita\x94";
        assert_eq!(decode_best_effort(bytes), "\u{201C}La Rita\u{201D}");
    }

    #[test]
    fn test_mojibake_penalized() {
        // UTF-8 bytes for "é" decoded as Latin-1 would show as "Ã©"; the
        // scorer must keep the clean UTF-8 reading instead.
        let bytes = "día única".as_bytes();
        let decoded = decode_best_effort(bytes);
        assert!(!decoded.contains('Ã'));
        assert_eq!(decoded, "día única");
    }
}
