//! Repository trait definitions
//!
//! These traits define the contract for data access and remote search.
//! Implementations live in the infrastructure and integrations layers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::DomainError;

/// A catalog response captured earlier for the same request
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub request_key: String,
    pub payload: String,
    pub captured_at: DateTime<Utc>,
}

/// Persistent store of catalog responses keyed by request.
///
/// At most one row exists per request key; `put` replaces it. Entries never expire,
/// they are only dropped by an explicit `reset`.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a previous response. No side effects.
    async fn get(&self, request_key: &str) -> Result<Option<CachedResponse>, DomainError>;

    /// Insert or replace the response for a key
    async fn put(
        &self,
        request_key: &str,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Remove every cached response
    async fn reset(&self) -> Result<(), DomainError>;
}

/// Remote catalog search returning the raw response document.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, title: &str, author: &str) -> Result<String, DomainError>;
}
