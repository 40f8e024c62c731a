use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::domain::{DomainError, SourceRecord};
use crate::modules::matching::normalize::present;

pub const ID_COLUMN: &str = "ID";
pub const TITLE_COLUMN: &str = "Title";
pub const SUBTITLE_COLUMN: &str = "Subtitle";
pub const AUTHOR_COLUMN: &str = "Author";
pub const PUBLISHER_COLUMN: &str = "Publisher";

// "Publisher 2", "Publisher_3"...: extra publishers of the same record
static NUMBERED_PUBLISHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Publisher[ _]?\d+$").unwrap());

fn is_publisher_column(name: &str) -> bool {
    name == PUBLISHER_COLUMN || NUMBERED_PUBLISHER.is_match(name)
}

/// Input header -> canonical column name
pub type ColumnMap = HashMap<String, String>;

pub fn load_column_map(path: &Path) -> Result<ColumnMap, DomainError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        DomainError::Configuration(format!("Invalid column map {}: {}", path.display(), e))
    })
}

pub fn read_source_records_from_path(
    path: &Path,
    column_map: &ColumnMap,
) -> Result<Vec<SourceRecord>, DomainError> {
    let file = std::fs::File::open(path)
        .map_err(|e| DomainError::Io(format!("Cannot open {}: {}", path.display(), e)))?;
    read_source_records(file, column_map)
}

/// Read input rows as source records. `ID` and `Title` columns are required (after
/// renaming through the column map); blank and "N/A" cells count as absent.
pub fn read_source_records<R: Read>(
    reader: R,
    column_map: &ColumnMap,
) -> Result<Vec<SourceRecord>, DomainError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let canonical: Vec<&str> = headers
        .iter()
        .map(|h| column_map.get(h.trim()).map(String::as_str).unwrap_or(h.trim()))
        .collect();
    let column = |name: &str| canonical.iter().position(|c| *c == name);

    let id_idx = column(ID_COLUMN).ok_or_else(|| {
        DomainError::Configuration(format!("Input has no '{}' column", ID_COLUMN))
    })?;
    let title_idx = column(TITLE_COLUMN).ok_or_else(|| {
        DomainError::Configuration(format!("Input has no '{}' column", TITLE_COLUMN))
    })?;
    let subtitle_idx = column(SUBTITLE_COLUMN);
    let author_idx = column(AUTHOR_COLUMN);
    let publisher_idxs: Vec<usize> = canonical
        .iter()
        .enumerate()
        .filter(|(_, name)| is_publisher_column(name))
        .map(|(idx, _)| idx)
        .collect();

    let mut records = Vec::new();
    let mut seen_ids = HashSet::new();

    for (row, result) in rdr.records().enumerate() {
        let row_values = result?;
        let cell = |idx: Option<usize>| idx.and_then(|i| row_values.get(i)).and_then(present);

        let id = cell(Some(id_idx)).ok_or_else(|| {
            DomainError::Configuration(format!("Row {} has an empty {}", row + 1, ID_COLUMN))
        })?;
        if !seen_ids.insert(id.clone()) {
            return Err(DomainError::Configuration(format!(
                "Duplicate {} '{}' on row {}",
                ID_COLUMN,
                id,
                row + 1
            )));
        }

        records.push(SourceRecord {
            id,
            title: cell(Some(title_idx)).unwrap_or_default(),
            subtitle: cell(subtitle_idx),
            author: cell(author_idx).unwrap_or_default(),
            publishers: publisher_idxs.iter().filter_map(|&i| cell(Some(i))).collect(),
            // Short rows are padded so every record carries the full header
            original: headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), row_values.get(i).unwrap_or("").to_string()))
                .collect(),
        });
    }

    tracing::info!("Loaded {} source records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_canonical_columns() {
        let csv = "ID,Title,Subtitle,Author,Publisher\n\
                   heb-1,The Great Gatsby,N/A,Fitzgerald,Scribner\n\
                   heb-2,Moby Dick,or The Whale,Melville,\n";
        let records = read_source_records(csv.as_bytes(), &ColumnMap::new()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "heb-1");
        assert_eq!(records[0].subtitle, None);
        assert_eq!(records[0].publishers, vec!["Scribner"]);
        assert_eq!(records[1].subtitle.as_deref(), Some("or The Whale"));
        assert!(records[1].publishers.is_empty());
        assert_eq!(records[1].original[0], ("ID".to_string(), "heb-2".to_string()));
    }

    #[test]
    fn test_column_map_renames_headers() {
        let csv = "HEB ID,Book Title,Author_Last,Imprint\nx1,Dune,Herbert,Chilton\n";
        let map: ColumnMap = [
            ("HEB ID", ID_COLUMN),
            ("Book Title", TITLE_COLUMN),
            ("Author_Last", AUTHOR_COLUMN),
            ("Imprint", PUBLISHER_COLUMN),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let records = read_source_records(csv.as_bytes(), &map).unwrap();
        assert_eq!(records[0].author, "Herbert");
        assert_eq!(records[0].publishers, vec!["Chilton"]);
        // original headers are preserved for output
        assert_eq!(records[0].original[1].0, "Book Title");
    }

    #[test]
    fn test_numbered_publisher_columns_are_collected() {
        let csv = "ID,Title,Author,Publisher 1,Publisher 2,Publisher 3\n\
                   heb-7,Dune,Herbert,Chilton Books,N/A,Ace\n\
                   heb-8,Emma,Austen,,,\n";
        let records = read_source_records(csv.as_bytes(), &ColumnMap::new()).unwrap();

        assert_eq!(records[0].publishers, vec!["Chilton Books", "Ace"]);
        assert!(records[1].publishers.is_empty());
    }

    #[test]
    fn test_short_rows_are_padded_to_header() {
        let csv = "ID,Title,Author,Publisher\n1,Dune,Herbert,Chilton\n2,Emma,Austen\n3,Ulysses,Joyce,,extra\n";
        let records = read_source_records(csv.as_bytes(), &ColumnMap::new()).unwrap();

        assert_eq!(records[1].original.len(), 4);
        assert_eq!(records[1].original[3], ("Publisher".to_string(), String::new()));
        assert_eq!(records[2].original.len(), 4);
    }

    #[test]
    fn test_missing_required_column_is_configuration_error() {
        let result = read_source_records("Title,Author\nDune,Herbert\n".as_bytes(), &ColumnMap::new());
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let csv = "ID,Title\n1,Dune\n1,Emma\n";
        let result = read_source_records(csv.as_bytes(), &ColumnMap::new());
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }
}
