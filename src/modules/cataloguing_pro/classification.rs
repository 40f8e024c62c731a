// Format Classification
// Ordered rules over qualifier/descriptor text; the first rule with any hit decides.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{CandidateRecord, Format, FormatPair};
use crate::modules::matching::normalize::normalize;

struct FormatRule {
    format: Format,
    patterns: Vec<Regex>,
}

fn rule(format: Format, patterns: &[&str]) -> FormatRule {
    FormatRule {
        format,
        patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
    }
}

// Patterns run against normalized text: lower-case, no periods, hyphens turned into spaces
static FORMAT_RULES: Lazy<Vec<FormatRule>> = Lazy::new(|| {
    vec![
        rule(
            Format::Electronic,
            &[
                r"\be ?books?\b",
                r"\bebk\b",
                r"\belectronic\b",
                r"\bonline\b",
                r"\bcomputer\b",
                r"\bpdf\b",
                r"\bepub\b",
                r"\bkindle\b",
            ],
        ),
        rule(Format::Microform, &[r"\bmicro ?(form|fiche|film|opaque)s?\b"]),
        rule(
            Format::Print,
            &[
                r"\bhard ?(cover|back|bound)\b",
                r"\bhbk?\b",
                r"\bhc\b",
                r"\bpaper ?(back|bound)\b",
                r"\bpbk?\b",
                r"\bcloth\b",
                r"\bprint\b",
                r"\btext\b",
                r"\bvolumes?\b",
                r"\bunmediated\b",
                r"\bpages\b",
            ],
        ),
        rule(
            Format::Other,
            &[
                r"\baudio",
                r"\bsound\b",
                r"\bspoken word\b",
                r"\bbraille\b",
                r"\bvideo",
                r"\bdvds?\b",
                r"\bcds?\b",
                r"\bkit\b",
            ],
        ),
    ]
});

/// First rule matched by any of the given strings, if any
pub fn classify_texts<S: AsRef<str>>(texts: &[S]) -> Option<Format> {
    let normalized: Vec<String> = texts.iter().map(|t| normalize(t.as_ref())).collect();

    FORMAT_RULES
        .iter()
        .find(|rule| {
            normalized
                .iter()
                .any(|text| rule.patterns.iter().any(|p| p.is_match(text)))
        })
        .map(|rule| rule.format)
}

/// One pair per distinct ISBN on the candidate. An ISBN's own qualifiers ("pbk.") win
/// over the record-level descriptors; no signal at all gives `Unknown`.
pub fn classify(candidate: &CandidateRecord) -> Vec<FormatPair> {
    let record_format = classify_texts(&candidate.descriptors);

    let mut pairs: Vec<FormatPair> = Vec::with_capacity(candidate.isbns.len());
    for isbn in &candidate.isbns {
        let format = classify_texts(&isbn.qualifiers)
            .or(record_format)
            .unwrap_or(Format::Unknown);
        if pairs.iter().any(|p| p.isbn == isbn.isbn) {
            continue;
        }
        pairs.push(FormatPair::new(isbn.isbn.clone(), format));
    }
    pairs
}
