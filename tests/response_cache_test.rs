use biblio_identify::db;
use biblio_identify::domain::ResponseCache;
use biblio_identify::infrastructure::SeaOrmResponseCache;
use biblio_identify::models::request;
use chrono::{Duration, TimeZone, Utc};
use sea_orm::{EntityTrait, PaginatorTrait};

// Helper to create a cache on a fresh in-memory database
async fn setup_cache() -> SeaOrmResponseCache {
    let conn = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    SeaOrmResponseCache::new(conn)
}

async fn row_count(cache: &SeaOrmResponseCache) -> u64 {
    request::Entity::find()
        .count(cache.connection())
        .await
        .expect("count failed")
}

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let cache = setup_cache().await;
    let hit = cache.get("http://example.org/srufrbrGrouping-off").await.unwrap();
    assert!(hit.is_none());
}

#[tokio::test]
async fn test_put_then_get_round_trips_payload_and_timestamp() {
    let cache = setup_cache().await;
    let captured = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

    cache
        .put("key-1", "<searchRetrieveResponse/>", captured)
        .await
        .unwrap();

    let hit = cache.get("key-1").await.unwrap().expect("row should exist");
    assert_eq!(hit.request_key, "key-1");
    assert_eq!(hit.payload, "<searchRetrieveResponse/>");
    assert_eq!(hit.captured_at, captured);
}

#[tokio::test]
async fn test_put_same_key_replaces_row() {
    let cache = setup_cache().await;
    let first = Utc::now();
    let later = first + Duration::minutes(5);

    cache.put("key-1", "old", first).await.unwrap();
    cache.put("key-1", "new", later).await.unwrap();

    assert_eq!(row_count(&cache).await, 1);
    let hit = cache.get("key-1").await.unwrap().unwrap();
    assert_eq!(hit.payload, "new");
    assert_eq!(hit.captured_at.timestamp(), later.timestamp());
}

#[tokio::test]
async fn test_repeated_identical_put_is_idempotent() {
    let cache = setup_cache().await;
    let at = Utc::now();

    for _ in 0..3 {
        cache.put("key-1", "payload", at).await.unwrap();
    }

    assert_eq!(row_count(&cache).await, 1);
    assert_eq!(cache.get("key-1").await.unwrap().unwrap().payload, "payload");
}

#[tokio::test]
async fn test_reset_clears_every_row() {
    let cache = setup_cache().await;
    cache.put("a", "1", Utc::now()).await.unwrap();
    cache.put("b", "2", Utc::now()).await.unwrap();

    cache.reset().await.unwrap();

    assert_eq!(row_count(&cache).await, 0);
    assert!(cache.get("a").await.unwrap().is_none());

    // still usable afterwards
    cache.put("a", "3", Utc::now()).await.unwrap();
    assert_eq!(cache.get("a").await.unwrap().unwrap().payload, "3");
}

#[tokio::test]
async fn test_recreate_cache_table_starts_empty() {
    let cache = setup_cache().await;
    cache.put("a", "1", Utc::now()).await.unwrap();

    db::recreate_cache_table(cache.connection()).await.unwrap();

    assert_eq!(row_count(&cache).await, 0);
    cache.put("a", "2", Utc::now()).await.unwrap();
    assert_eq!(row_count(&cache).await, 1);
}
