//! Text canonicalization applied before any fuzzy comparison

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static UP_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bup\b").unwrap());
static UOF_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bu of\b").unwrap());
static UNIV_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\buniv\b").unwrap());

static NOT_AVAILABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<?\s*n\s*[./]?\s*a\s*\.?\s*>?\s*$").unwrap());

/// Lower-case, fold accents, drop punctuation and collapse whitespace.
///
/// `&` is spelled out as `and`; periods, commas and apostrophes vanish
/// ("U.S." -> "us"), any other punctuation separates words.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            '&' => out.push_str(" and "),
            '.' | ',' | '\'' | '\u{2018}' | '\u{2019}' => {}
            c if c.is_alphanumeric() => {
                out.extend(c.to_lowercase().filter(|l| !is_combining_mark(*l)));
            }
            _ => out.push(' '),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `normalize` plus expansion of the usual university-press abbreviations.
pub fn normalize_publisher(text: &str) -> String {
    let normalized = normalize(text);
    let expanded = UP_PATTERN.replace_all(&normalized, "university press");
    let expanded = UOF_PATTERN.replace_all(&expanded, "university of");
    UNIV_PATTERN.replace_all(&expanded, "university").into_owned()
}

/// Catalog and spreadsheet placeholders ("N/A", "n.a.", "<NA>") that mean "no value".
pub fn is_not_available(value: &str) -> bool {
    NOT_AVAILABLE_PATTERN.is_match(value)
}

/// Trimmed value, or `None` for blanks and placeholders
pub fn present(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_not_available(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
