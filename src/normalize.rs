//! OCR-text normalization into marketplace-safe search queries.
//!
//! Recognized card text is full of copyright boilerplate, manufacturer URLs
//! and OCR misreads. `normalize` is a pure pipeline that strips the noise,
//! fixes the known misreads and caps the query length so trailing junk never
//! drowns the search.

use lazy_static::lazy_static;
use regex::Regex;

/// Maximum number of tokens kept in a query.
pub const MAX_QUERY_TOKENS: usize = 6;

/// Fixed OCR-misread corrections, applied in order as case-insensitive
/// substring replacements. XeTOPPS must run before TOPPS.
const CORRECTIONS: &[(&str, &str)] = &[
    ("XeTOPPS", "Topps"),
    ("TOPPS", "Topps"),
    ("PANNI", "Panini"),
    ("CHROME", "Chrome"),
    ("ROOKE", "Rookie"),
    ("RC", "Rookie"),
];

lazy_static! {
    static ref BOILERPLATE: Regex =
        Regex::new(r"(?i)(www\.|\.com|©|inc\.|company|rights reserved|code[[:alnum:]]+)").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref CORRECTION_PATTERNS: Vec<(Regex, &'static str)> = CORRECTIONS
        .iter()
        .map(|(from, to)| {
            let pattern = Regex::new(&format!("(?i){}", regex::escape(from))).unwrap();
            (pattern, *to)
        })
        .collect();
}

/// Turns raw recognized text into a short marketplace query.
///
/// Deterministic and side-effect free; empty input yields an empty string.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let cleaned = BOILERPLATE.replace_all(raw, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let mut cleaned = cleaned.trim().to_string();

    for (pattern, replacement) in CORRECTION_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }

    cleaned
        .split_whitespace()
        .take(MAX_QUERY_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}
