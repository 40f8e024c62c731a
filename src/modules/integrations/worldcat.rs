//! WorldCat Search API (SRU) client backed by the response cache
//!
//! Every search is keyed by its query parameters; a cached response is returned without
//! touching the network. Lookups for the same key are serialized so two in-flight
//! searches never both fetch and write the same row, and outbound requests are bounded
//! by a semaphore.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use crate::domain::{CatalogSearch, DomainError, ResponseCache};
use crate::infrastructure::config::CatalogSettings;
use crate::modules::matching::normalize::normalize;

/// Parameters that must never end up in a cache key
pub const PRIVATE_PARAMS: [&str; 1] = ["wskey"];

/// Deterministic identifier for a request: base URL followed by the sorted public
/// parameters rendered as `name-value` and joined with `&`.
pub fn request_key(base_url: &str, params: &BTreeMap<&str, String>, private: &[&str]) -> String {
    let fields: Vec<String> = params
        .iter()
        .filter(|(name, _)| !private.contains(name))
        .map(|(name, value)| format!("{}-{}", name, value))
        .collect();
    format!("{}{}", base_url, fields.join("&"))
}

/// CQL query for a title/author pair. Quotes and apostrophes break the query string.
pub fn build_query(title: &str, author: &str) -> String {
    let title = normalize(title).replace('"', " ");
    let author: String = author
        .chars()
        .map(|c| if c == '\'' || c == '"' { ' ' } else { c })
        .collect();
    format!(
        r#"srw.ti all "{}" and srw.au all "{}""#,
        title,
        author.trim()
    )
}

pub struct WorldCatClient {
    http: reqwest::Client,
    settings: CatalogSettings,
    api_key: String,
    cache: Arc<dyn ResponseCache>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
    outbound: Semaphore,
}

impl WorldCatClient {
    pub fn new(
        settings: &CatalogSettings,
        api_key: &str,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings: settings.clone(),
            api_key: api_key.to_string(),
            cache,
            key_locks: DashMap::new(),
            outbound: Semaphore::new(settings.max_concurrent_requests.max(1)),
        })
    }

    fn query_params(&self, title: &str, author: &str) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("query", build_query(title, author)),
            ("maximumRecords", self.settings.max_records.to_string()),
            ("frbrGrouping", "off".to_string()),
        ])
    }

    pub fn request_key_for(&self, title: &str, author: &str) -> String {
        request_key(
            self.settings.base_url.as_str(),
            &self.query_params(title, author),
            &PRIVATE_PARAMS,
        )
    }

    async fn fetch(&self, params: &BTreeMap<&'static str, String>) -> Result<String, DomainError> {
        let _permit = self
            .outbound
            .acquire()
            .await
            .map_err(|e| DomainError::TransientFetch(format!("Request limiter closed: {}", e)))?;

        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("wskey", self.api_key.as_str()));

        let response = self
            .http
            .get(self.settings.base_url.clone())
            .query(&query)
            .send()
            .await
            .map_err(|e| DomainError::TransientFetch(format!("WorldCat request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            tracing::warn!("Reached WorldCat API limit");
            return Err(DomainError::TransientFetch(
                "API limit reached (HTTP 403)".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(DomainError::TransientFetch(format!(
                "WorldCat returned status {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| DomainError::TransientFetch(format!("Failed to read response body: {}", e)))
    }

    async fn cached_fetch(
        &self,
        key: &str,
        params: &BTreeMap<&'static str, String>,
    ) -> Result<String, DomainError> {
        if let Some(hit) = self.cache.get(key).await? {
            tracing::debug!("Cache hit for {} (captured {})", key, hit.captured_at);
            return Ok(hit.payload);
        }

        tracing::debug!("Cache miss, requesting {}", key);
        let payload = self.fetch(params).await?;
        self.cache.put(key, &payload, Utc::now()).await?;

        Ok(payload)
    }

    /// Keys with a search in flight
    pub fn pending_keys(&self) -> usize {
        self.key_locks.len()
    }
}

#[async_trait]
impl CatalogSearch for WorldCatClient {
    async fn search(&self, title: &str, author: &str) -> Result<String, DomainError> {
        let params = self.query_params(title, author);
        let key = request_key(self.settings.base_url.as_str(), &params, &PRIVATE_PARAMS);

        let lock = self.key_locks.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.cached_fetch(&key, &params).await
        };

        // Drop the lock entry unless another search for this key is waiting on it
        self.key_locks
            .remove_if(&key, |_, entry| Arc::strong_count(entry) <= 2);

        result
    }
}
