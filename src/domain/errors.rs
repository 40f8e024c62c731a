//! Domain error types
//!
//! These errors are framework-agnostic and describe how a failure affects the run:
//! `Storage` and `Configuration` abort it, everything else is contained to one source record.

use std::fmt;

#[derive(Debug, Clone)]
pub enum DomainError {
    /// Response cache could not be read or written
    Storage(String),
    /// Network/API failure for one search
    TransientFetch(String),
    /// Catalog payload could not be turned into records
    Parse(String),
    /// Invalid settings or input layout, detected before processing starts
    Configuration(String),
    /// Input/output file error
    Io(String),
}

impl DomainError {
    /// Whether this error must stop the whole run instead of a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DomainError::Storage(_) | DomainError::Configuration(_) | DomainError::Io(_)
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::Storage(msg) => write!(f, "Storage error: {}", msg),
            DomainError::TransientFetch(msg) => write!(f, "Fetch error: {}", msg),
            DomainError::Parse(msg) => write!(f, "Parse error: {}", msg),
            DomainError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            DomainError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(e.to_string())
    }
}

impl From<csv::Error> for DomainError {
    fn from(e: csv::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}
