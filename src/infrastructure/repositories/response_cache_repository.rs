//! ResponseCache implementations: SQLite via SeaORM, and an in-memory map

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{CachedResponse, DomainError, ResponseCache};
use crate::models::request::{self, ActiveModel, Entity as RequestEntity};

/// SeaORM-based implementation of ResponseCache
pub struct SeaOrmResponseCache {
    db: DatabaseConnection,
}

impl SeaOrmResponseCache {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn to_cached_response(row: request::Model) -> Result<CachedResponse, DomainError> {
    let captured_at = DateTime::parse_from_rfc3339(&row.timestamp)
        .map_err(|e| {
            DomainError::Storage(format!(
                "Corrupt timestamp '{}' for cached request {}: {}",
                row.timestamp, row.request_url, e
            ))
        })?
        .with_timezone(&Utc);

    Ok(CachedResponse {
        request_key: row.request_url,
        payload: row.response,
        captured_at,
    })
}

#[async_trait]
impl ResponseCache for SeaOrmResponseCache {
    async fn get(&self, request_key: &str) -> Result<Option<CachedResponse>, DomainError> {
        let row = RequestEntity::find()
            .filter(request::Column::RequestUrl.eq(request_key))
            .one(&self.db)
            .await?;

        row.map(to_cached_response).transpose()
    }

    async fn put(
        &self,
        request_key: &str,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let row = ActiveModel {
            request_url: Set(request_key.to_string()),
            response: Set(payload.to_string()),
            timestamp: Set(captured_at.to_rfc3339()),
            ..Default::default()
        };

        RequestEntity::insert(row)
            .on_conflict(
                OnConflict::column(request::Column::RequestUrl)
                    .update_columns([request::Column::Response, request::Column::Timestamp])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn reset(&self) -> Result<(), DomainError> {
        let result = RequestEntity::delete_many().exec(&self.db).await?;
        tracing::info!("Cleared {} cached responses", result.rows_affected);
        Ok(())
    }
}

/// Process-local cache, for tests and dry runs
#[derive(Default)]
pub struct InMemoryResponseCache {
    rows: Mutex<HashMap<String, CachedResponse>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CachedResponse>>, DomainError> {
        self.rows
            .lock()
            .map_err(|_| DomainError::Storage("In-memory cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, request_key: &str) -> Result<Option<CachedResponse>, DomainError> {
        Ok(self.lock()?.get(request_key).cloned())
    }

    async fn put(
        &self,
        request_key: &str,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.lock()?.insert(
            request_key.to_string(),
            CachedResponse {
                request_key: request_key.to_string(),
                payload: payload.to_string(),
                captured_at,
            },
        );
        Ok(())
    }

    async fn reset(&self) -> Result<(), DomainError> {
        self.lock()?.clear();
        Ok(())
    }
}
