use bridge_common::types::ScrapedContent;
use bridge_storage::RedisCache;
use chrono::Utc;
use uuid::Uuid;

fn get_test_redis_url() -> String {
    std::env::var("TEST_REDIS_URL")
        .expect("TEST_REDIS_URL must be set (use docker-compose.test.yml)")
}

fn sample_content(canonical_url: &str) -> ScrapedContent {
    ScrapedContent {
        id: 1,
        crawl_session_id: format!("crawl-{}", Uuid::new_v4()),
        url: canonical_url.to_string(),
        canonical_url: canonical_url.to_string(),
        source_url: None,
        content_source: "scraper".to_string(),
        markdown: "hello world".to_string(),
        title: Some("Example".to_string()),
        description: None,
        links: serde_json::json!({}),
        extra_metadata: serde_json::json!({}),
        screenshot_ref: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
async fn test_redis_read_through_roundtrip() {
    let canonical_url = format!("https://example.com/{}", Uuid::new_v4());
    let cache = RedisCache::new(&get_test_redis_url(), 60).await.unwrap();

    assert!(cache.get(&canonical_url).await.unwrap().is_none());

    let rows = vec![sample_content(&canonical_url)];
    cache.put(&canonical_url, &rows).await.unwrap();

    let hit = cache.get(&canonical_url).await.unwrap().unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].markdown, "hello world");

    cache.invalidate(&canonical_url).await.unwrap();
    assert!(cache.get(&canonical_url).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_redis_ttl_expires_entry() {
    let canonical_url = format!("https://example.com/{}", Uuid::new_v4());
    let cache = RedisCache::new(&get_test_redis_url(), 1).await.unwrap();

    cache.put(&canonical_url, &[sample_content(&canonical_url)]).await.unwrap();
    assert!(cache.get(&canonical_url).await.unwrap().is_some());

    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    assert!(cache.get(&canonical_url).await.unwrap().is_none());
}
