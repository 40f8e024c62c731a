//! Projection of MARC records into flat candidate records

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::marc::{MarcRecord, parse_marc_xml};
use crate::domain::{CandidateIsbn, CandidateRecord};
use crate::modules::matching::normalize::normalize;

static ISBN_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{9}[\dX]|\d{13})$").unwrap());
static PAREN_CONTENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]+)\)").unwrap());

// Fields carrying material-type hints
const DESCRIPTOR_FIELDS: [(&str, char); 6] = [
    ("245", 'h'), // general material designation
    ("300", 'a'), // extent
    ("336", 'a'), // content type
    ("337", 'a'), // media type
    ("338", 'a'), // carrier type
    ("655", 'a'), // genre/form
];

/// A response that could not be used; the record still gets processed, with no candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Parsed search response. Candidates are projected on demand, so iterating twice
/// yields the same sequence.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub number_of_records: Option<u64>,
    records: Vec<MarcRecord>,
    pub warning: Option<ParseWarning>,
}

impl ParsedResponse {
    pub fn candidates(&self) -> impl Iterator<Item = CandidateRecord> + '_ {
        self.records.iter().filter_map(project_candidate)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Parse a raw catalog payload. Never fails: unusable payloads produce an empty
/// response carrying a warning.
pub fn parse(raw: &str) -> ParsedResponse {
    match parse_marc_xml(raw) {
        Ok(response) => {
            let warning = if response.diagnostics.is_empty() {
                None
            } else {
                Some(ParseWarning {
                    message: format!("catalog diagnostics: {}", response.diagnostics.join("; ")),
                })
            };
            ParsedResponse {
                number_of_records: response.number_of_records,
                records: response.records,
                warning,
            }
        }
        Err(e) => ParsedResponse {
            warning: Some(ParseWarning {
                message: e.to_string(),
            }),
            ..Default::default()
        },
    }
}

/// Flatten one MARC record. Records without a title carry nothing to compare and are skipped.
pub fn project_candidate(record: &MarcRecord) -> Option<CandidateRecord> {
    let title_field = record.first_field("245")?;
    let Some(main_title) = title_field.subfield('a') else {
        tracing::debug!(
            "Skipping record {:?} without a title",
            record.control_field("001")
        );
        return None;
    };
    let title = match title_field.subfield('b') {
        Some(remainder) => format!("{} {}", main_title, remainder),
        None => main_title,
    };

    let author = ["100", "110", "111"]
        .iter()
        .find_map(|tag| record.first_field(tag).and_then(|f| f.subfield('a')))
        .or_else(|| title_field.subfield('c'));

    Some(CandidateRecord {
        control_number: record.control_field("001").map(str::to_string),
        title,
        author,
        publisher: publisher(record),
        isbns: isbns(record),
        descriptors: descriptors(record),
    })
}

fn publisher(record: &MarcRecord) -> Option<String> {
    // 264 second indicator 1 is the publication statement; others are manufacture, copyright...
    let mut statements: Vec<String> = record
        .fields("264")
        .filter(|f| f.ind2 == '1')
        .chain(record.fields("264").filter(|f| f.ind2 != '1'))
        .chain(record.fields("260"))
        .filter_map(|f| f.subfield('b'))
        .collect();
    statements.dedup();

    if statements.len() > 1 {
        tracing::warn!(
            "Multiple publishers on record {:?}: {:?}, using the first",
            record.control_field("001"),
            statements
        );
    }
    statements.into_iter().next()
}

/// `9780743273565 (pbk. : alk. paper)` -> ("9780743273565", ["pbk. : alk. paper"])
fn split_isbn_value(value: &str) -> Option<(String, Option<String>)> {
    let mut parts = value.trim().splitn(2, char::is_whitespace);
    let number: String = parts
        .next()?
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !ISBN_SHAPE.is_match(&number) {
        return None;
    }

    let overflow = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(|rest| {
        let inner: Vec<&str> = PAREN_CONTENT
            .captures_iter(rest)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if inner.is_empty() {
            rest.to_string()
        } else {
            inner.join(" ")
        }
    });

    Some((number, overflow))
}

fn isbns(record: &MarcRecord) -> Vec<CandidateIsbn> {
    let mut out: Vec<CandidateIsbn> = Vec::new();

    for field in record.fields("020") {
        let qualifiers: Vec<String> = field.subfield_values('q').collect();

        for value in field.subfield_values('a') {
            let Some((number, overflow)) = split_isbn_value(&value) else {
                tracing::debug!("Ignoring malformed ISBN '{}'", value);
                continue;
            };

            let entry = match out.iter_mut().position(|i| i.isbn == number) {
                Some(idx) => &mut out[idx],
                None => {
                    out.push(CandidateIsbn::new(number));
                    let last = out.len() - 1;
                    &mut out[last]
                }
            };
            for qualifier in qualifiers.iter().cloned().chain(overflow) {
                if !normalize(&qualifier).is_empty() && !entry.qualifiers.contains(&qualifier) {
                    entry.qualifiers.push(qualifier);
                }
            }
        }
    }

    out
}

fn descriptors(record: &MarcRecord) -> Vec<String> {
    let mut out: Vec<String> = DESCRIPTOR_FIELDS
        .iter()
        .flat_map(|(tag, code)| {
            record
                .fields(tag)
                .flat_map(move |f| f.subfield_values(*code).collect::<Vec<_>>())
        })
        .collect();

    // 007/00: category of material
    let category = record
        .control_field("007")
        .and_then(|v| v.chars().next())
        .and_then(|c| match c {
            'c' => Some("computer"),
            'h' => Some("microform"),
            't' => Some("text"),
            _ => None,
        });
    if let Some(category) = category {
        out.push(category.to_string());
    }

    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(records: &str) -> String {
        format!(
            "<searchRetrieveResponse><numberOfRecords>2</numberOfRecords><records>{}</records></searchRetrieveResponse>",
            records
        )
    }

    #[test]
    fn test_projects_holding() {
        let xml = wrap(
            r#"<record><recordData><record>
                <controlfield tag="001">ocm1</controlfield>
                <controlfield tag="007">cr |||||||||||</controlfield>
                <datafield tag="020" ind1=" " ind2=" ">
                    <subfield code="a">978-0-7432-7356-5</subfield>
                    <subfield code="q">electronic bk.</subfield>
                </datafield>
                <datafield tag="020" ind1=" " ind2=" ">
                    <subfield code="a">0743273567 (pbk.)</subfield>
                </datafield>
                <datafield tag="020" ind1=" " ind2=" ">
                    <subfield code="a">9780743273565</subfield>
                </datafield>
                <datafield tag="100" ind1="1" ind2=" "><subfield code="a">Fitzgerald, F. Scott,</subfield></datafield>
                <datafield tag="245" ind1="1" ind2="4">
                    <subfield code="a">The great Gatsby :</subfield>
                    <subfield code="b">a novel /</subfield>
                </datafield>
                <datafield tag="264" ind1=" " ind2="4"><subfield code="b">Copyright Holder</subfield></datafield>
                <datafield tag="264" ind1=" " ind2="1"><subfield code="b">Scribner,</subfield></datafield>
                <datafield tag="338" ind1=" " ind2=" "><subfield code="a">online resource</subfield></datafield>
            </record></recordData></record>"#,
        );
        let parsed = parse(&xml);
        assert!(parsed.warning.is_none());

        let candidates: Vec<_> = parsed.candidates().collect();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.control_number.as_deref(), Some("ocm1"));
        assert_eq!(c.title, "The great Gatsby : a novel /");
        assert_eq!(c.author.as_deref(), Some("Fitzgerald, F. Scott,"));
        assert_eq!(c.publisher.as_deref(), Some("Scribner,"));
        assert_eq!(c.isbn_values().collect::<Vec<_>>(), vec!["9780743273565", "0743273567"]);
        assert_eq!(c.isbns[0].qualifiers, vec!["electronic bk.".to_string()]);
        assert_eq!(c.isbns[1].qualifiers, vec!["pbk.".to_string()]);
        assert_eq!(c.descriptors, vec!["online resource".to_string(), "computer".to_string()]);
    }

    #[test]
    fn test_untitled_holdings_are_skipped() {
        let xml = wrap(
            r#"<record><recordData><record>
                <datafield tag="020" ind1=" " ind2=" "><subfield code="a">9780743273565</subfield></datafield>
            </record></recordData></record>
            <record><recordData><record>
                <datafield tag="245" ind1="0" ind2="0"><subfield code="a">Kept</subfield></datafield>
            </record></recordData></record>"#,
        );
        let parsed = parse(&xml);
        assert_eq!(parsed.record_count(), 2);
        let titles: Vec<_> = parsed.candidates().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Kept".to_string()]);
    }

    #[test]
    fn test_statement_of_responsibility_is_author_fallback() {
        let xml = wrap(
            r#"<record><recordData><record>
                <datafield tag="245" ind1="0" ind2="0">
                    <subfield code="a">Collected essays /</subfield>
                    <subfield code="c">edited by Jane Doe.</subfield>
                </datafield>
            </record></recordData></record>"#,
        );
        let candidate = parse(&xml).candidates().next().unwrap();
        assert_eq!(candidate.author.as_deref(), Some("edited by Jane Doe."));
        assert!(candidate.isbns.is_empty());
    }

    #[test]
    fn test_parsing_is_restartable() {
        let xml = wrap(
            r#"<record><recordData><record>
                <datafield tag="245" ind1="0" ind2="0"><subfield code="a">Again</subfield></datafield>
            </record></recordData></record>"#,
        );
        let parsed = parse(&xml);
        let first: Vec<_> = parsed.candidates().collect();
        let second: Vec<_> = parsed.candidates().collect();
        assert_eq!(first, second);
        assert_eq!(first, parse(&xml).candidates().collect::<Vec<_>>());
    }

    #[test]
    fn test_bad_payload_yields_warning_and_no_candidates() {
        let parsed = parse("<searchRetrieveResponse><records>");
        assert!(parsed.warning.is_some());
        assert_eq!(parsed.candidates().count(), 0);

        let parsed = parse("");
        assert!(parsed.warning.is_some());
        assert_eq!(parsed.candidates().count(), 0);
    }

    #[test]
    fn test_split_isbn_value() {
        assert_eq!(
            split_isbn_value("9780743273565 (pbk. : alk. paper)"),
            Some(("9780743273565".to_string(), Some("pbk. : alk. paper".to_string())))
        );
        assert_eq!(
            split_isbn_value("080442957x hardcover"),
            Some(("080442957X".to_string(), Some("hardcover".to_string())))
        );
        assert_eq!(split_isbn_value("12345"), None);
    }
}
