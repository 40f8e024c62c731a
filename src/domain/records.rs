//! Records flowing through the identification pipeline

use serde::Serialize;
use std::fmt;

/// One input row to identify. Produced by ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    /// Every known publisher; `Publisher`, `Publisher 1`, `Publisher 2`... in column order
    pub publishers: Vec<String>,
    /// Original (header, value) cells, kept so unmatched rows can be written back verbatim
    #[serde(skip)]
    pub original: Vec<(String, String)>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            author: author.into(),
            publishers: Vec::new(),
            original: Vec::new(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publishers.push(publisher.into());
        self
    }

    /// Title followed by the subtitle, when there is one
    pub fn full_title(&self) -> String {
        match self.subtitle.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => format!("{} {}", self.title, sub),
            _ => self.title.clone(),
        }
    }
}

/// An ISBN as printed on one catalog holding, with its qualifying notes ("pbk.", "ebook", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateIsbn {
    pub isbn: String,
    pub qualifiers: Vec<String>,
}

impl CandidateIsbn {
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            qualifiers: Vec::new(),
        }
    }
}

/// One catalog holding flattened out of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub control_number: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    /// Distinct ISBNs in catalog order
    pub isbns: Vec<CandidateIsbn>,
    /// Material-type hints: general material designation, extent, content/media/carrier types
    pub descriptors: Vec<String>,
}

impl CandidateRecord {
    pub fn isbn_values(&self) -> impl Iterator<Item = &str> {
        self.isbns.iter().map(|i| i.isbn.as_str())
    }
}

/// Outcome of comparing one candidate against one source record
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub source_id: String,
    pub candidate: CandidateRecord,
    pub title_similarity: f64,
    /// Best score over the source's publishers; `None` when either side has no publisher
    /// and the comparison was skipped
    pub publisher_similarity: Option<f64>,
    pub is_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Format {
    Print,
    Electronic,
    Microform,
    Other,
    Unknown,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Print => "Print",
            Format::Electronic => "Electronic",
            Format::Microform => "Microform",
            Format::Other => "Other",
            Format::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FormatPair {
    pub isbn: String,
    pub format: Format,
}

impl FormatPair {
    pub fn new(isbn: impl Into<String>, format: Format) -> Self {
        Self {
            isbn: isbn.into(),
            format,
        }
    }
}
