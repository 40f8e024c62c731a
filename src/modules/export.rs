use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::domain::{DomainError, SourceRecord};
use crate::modules::import::{
    AUTHOR_COLUMN, ID_COLUMN, PUBLISHER_COLUMN, SUBTITLE_COLUMN, TITLE_COLUMN,
};
use crate::services::accumulator::IdentifyResults;

/// Provenance written on every matched row
pub const SOURCE_TAG: &str = "WorldCat";

pub const MATCHED_FILE: &str = "matched_manifests.csv";
pub const UNMATCHED_FILE: &str = "no_isbn_matches.csv";

#[derive(Debug, Serialize)]
struct MatchedRow<'a> {
    #[serde(rename = "Source ID")]
    source_id: &'a str,
    #[serde(rename = "Source Title")]
    source_title: &'a str,
    #[serde(rename = "ISBN")]
    isbn: &'a str,
    #[serde(rename = "Format")]
    format: &'a str,
    #[serde(rename = "Source")]
    source: &'a str,
}

/// One row per matched (record, ISBN, format). Returns the number of rows written.
pub fn write_matched<W: Write>(
    writer: W,
    results: &IdentifyResults,
    records: &[SourceRecord],
) -> Result<usize, DomainError> {
    let titles: HashMap<&str, &str> = records
        .iter()
        .map(|r| (r.id.as_str(), r.title.as_str()))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for matched in &results.matched {
        let source_title = titles.get(matched.source_id.as_str()).copied().unwrap_or("");
        for pair in &matched.pairs {
            wtr.serialize(MatchedRow {
                source_id: &matched.source_id,
                source_title,
                isbn: &pair.isbn,
                format: pair.format.as_str(),
                source: SOURCE_TAG,
            })?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}

/// Unmatched records reproduced with their original columns.
pub fn write_unmatched<W: Write>(
    writer: W,
    results: &IdentifyResults,
    records: &[SourceRecord],
) -> Result<usize, DomainError> {
    let unmatched: Vec<&SourceRecord> = records
        .iter()
        .filter(|r| results.is_unmatched(&r.id))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);
    let Some(first) = unmatched.first() else {
        wtr.flush()?;
        return Ok(0);
    };

    if first.original.is_empty() {
        // Records built in code rather than read from a file
        wtr.write_record([
            ID_COLUMN,
            TITLE_COLUMN,
            SUBTITLE_COLUMN,
            AUTHOR_COLUMN,
            PUBLISHER_COLUMN,
        ])?;
        for record in &unmatched {
            let publishers = record.publishers.join("; ");
            wtr.write_record([
                record.id.as_str(),
                record.title.as_str(),
                record.subtitle.as_deref().unwrap_or(""),
                record.author.as_str(),
                publishers.as_str(),
            ])?;
        }
    } else {
        let width = first.original.len();
        wtr.write_record(first.original.iter().map(|(header, _)| header.as_str()))?;
        for record in &unmatched {
            // Every row is written at header width, missing cells left empty
            wtr.write_record((0..width).map(|i| {
                record
                    .original
                    .get(i)
                    .map(|(_, value)| value.as_str())
                    .unwrap_or("")
            }))?;
        }
    }

    wtr.flush()?;
    Ok(unmatched.len())
}

/// Write both result files into `output_dir`. A file is only created when it has rows.
pub fn write_results(
    output_dir: &Path,
    results: &IdentifyResults,
    records: &[SourceRecord],
) -> Result<(), DomainError> {
    std::fs::create_dir_all(output_dir)?;

    if !results.matched.is_empty() {
        let path = output_dir.join(MATCHED_FILE);
        let rows = write_matched(std::fs::File::create(&path)?, results, records)?;
        tracing::info!("Wrote {} matched rows to {}", rows, path.display());
    }

    if !results.unmatched.is_empty() {
        let path = output_dir.join(UNMATCHED_FILE);
        let rows = write_unmatched(std::fs::File::create(&path)?, results, records)?;
        tracing::info!("Wrote {} unmatched records to {}", rows, path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Format, FormatPair};
    use crate::services::accumulator::ResultAccumulator;

    fn sample() -> (IdentifyResults, Vec<SourceRecord>) {
        let records = vec![
            SourceRecord::new("heb-1", "The Great Gatsby", "Fitzgerald"),
            SourceRecord::new("heb-2", "Unknown Book", "Nobody").with_publisher("Nowhere"),
        ];
        let mut acc = ResultAccumulator::new();
        acc.accumulate(
            "heb-1",
            vec![
                FormatPair::new("9780743273565", Format::Print),
                FormatPair::new("9781234567897", Format::Electronic),
            ],
        );
        acc.accumulate("heb-2", Vec::new());
        (acc.finalize(), records)
    }

    #[test]
    fn test_write_matched_rows() {
        let (results, records) = sample();
        let mut out = Vec::new();
        let rows = write_matched(&mut out, &results, &records).unwrap();

        assert_eq!(rows, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Source ID,Source Title,ISBN,Format,Source");
        assert_eq!(lines[1], "heb-1,The Great Gatsby,9780743273565,Print,WorldCat");
        assert_eq!(lines[2], "heb-1,The Great Gatsby,9781234567897,Electronic,WorldCat");
    }

    #[test]
    fn test_write_unmatched_reproduces_fields() {
        let (results, records) = sample();
        let mut out = Vec::new();
        let rows = write_unmatched(&mut out, &results, &records).unwrap();

        assert_eq!(rows, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("ID,Title,Subtitle,Author,Publisher\n"));
        assert!(text.contains("heb-2,Unknown Book,,Nobody,Nowhere"));
    }

    #[test]
    fn test_write_unmatched_handles_short_input_rows() {
        let input = "ID,Title,Author,Publisher\n1,Dune,Herbert,Chilton\n2,Emma,Austen\n";
        let records =
            crate::modules::import::read_source_records(input.as_bytes(), &Default::default())
                .unwrap();
        let mut acc = ResultAccumulator::new();
        acc.accumulate("1", Vec::new());
        acc.accumulate("2", Vec::new());
        let results = acc.finalize();

        let mut out = Vec::new();
        let rows = write_unmatched(&mut out, &results, &records).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID,Title,Author,Publisher\n1,Dune,Herbert,Chilton\n2,Emma,Austen,\n"
        );
    }

    #[test]
    fn test_write_results_skips_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let results = IdentifyResults::default();
        write_results(dir.path(), &results, &[]).unwrap();

        assert!(!dir.path().join(MATCHED_FILE).exists());
        assert!(!dir.path().join(UNMATCHED_FILE).exists());
    }
}
