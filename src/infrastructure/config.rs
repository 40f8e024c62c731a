use std::env;
use std::path::PathBuf;
use url::Url;

use crate::domain::DomainError;

pub const DEFAULT_WORLDCAT_BASE_URL: &str =
    "http://www.worldcat.org/webservices/catalog/search/worldcat/sru";
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

/// Connection settings for the catalog search API
#[derive(Clone, Debug)]
pub struct CatalogSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub max_records: u32,
    pub max_concurrent_requests: usize,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub cache_database_url: String,
    pub catalog: CatalogSettings,
    pub input_csv_path: PathBuf,
    pub output_dir: PathBuf,
    pub column_map_path: Option<PathBuf>,
    pub match_threshold: f64,
    /// Test mode: only the first N input records are processed
    pub test_mode_records: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get("WORLDCAT_BASE_URL")
            .unwrap_or_else(|| DEFAULT_WORLDCAT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url).map_err(|e| {
            DomainError::Configuration(format!("WORLDCAT_BASE_URL '{}': {}", base_url, e))
        })?;

        let match_threshold = match get("MATCH_THRESHOLD") {
            Some(raw) => validate_threshold(parse_value::<f64>("MATCH_THRESHOLD", &raw)?)?,
            None => DEFAULT_MATCH_THRESHOLD,
        };

        let test_mode_records = get("TEST_MODE_RECORDS")
            .map(|raw| parse_value::<usize>("TEST_MODE_RECORDS", &raw))
            .transpose()?;

        let max_concurrent_requests = get("MAX_CONCURRENT_REQUESTS")
            .map(|raw| parse_value::<usize>("MAX_CONCURRENT_REQUESTS", &raw))
            .transpose()?
            .unwrap_or(1);
        if max_concurrent_requests == 0 {
            return Err(DomainError::Configuration(
                "MAX_CONCURRENT_REQUESTS must be at least 1".to_string(),
            ));
        }

        let max_records = get("MAX_RECORDS_PER_QUERY")
            .map(|raw| parse_value::<u32>("MAX_RECORDS_PER_QUERY", &raw))
            .transpose()?
            .unwrap_or(100);

        Ok(Self {
            cache_database_url: get("CACHE_DATABASE_URL")
                .unwrap_or_else(|| "sqlite://identify_cache.db?mode=rwc".to_string()),
            catalog: CatalogSettings {
                base_url,
                api_key: get("WORLDCAT_API_KEY"),
                max_records,
                max_concurrent_requests,
            },
            input_csv_path: get("INPUT_CSV_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/books.csv")),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            column_map_path: get("COLUMN_MAP_PATH").map(PathBuf::from),
            match_threshold,
            test_mode_records,
        })
    }

    /// The API key is only needed once we actually talk to the catalog.
    pub fn require_api_key(&self) -> Result<&str, DomainError> {
        self.catalog
            .api_key
            .as_deref()
            .ok_or_else(|| DomainError::Configuration("WORLDCAT_API_KEY is not set".to_string()))
    }
}

/// Similarity thresholds are ratios: anything outside (0, 1] can't express a sensible cut-off.
pub fn validate_threshold(threshold: f64) -> Result<f64, DomainError> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(threshold)
    } else {
        Err(DomainError::Configuration(format!(
            "match threshold must be in (0, 1], got {}",
            threshold
        )))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, DomainError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| DomainError::Configuration(format!("{} '{}': {}", key, raw, e)))
}
