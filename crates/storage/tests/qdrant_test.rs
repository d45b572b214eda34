use bridge_common::types::{DocumentChunkPayload, SearchFilters};
use bridge_storage::QdrantClient;
use chrono::Utc;
use uuid::Uuid;

fn get_test_qdrant_url() -> String {
    std::env::var("TEST_QDRANT_URL")
        .expect("TEST_QDRANT_URL must be set (use docker-compose.test.yml)")
}

fn test_collection_name(suffix: &str) -> String {
    format!("test_{}_{}", suffix, Uuid::new_v4().to_string().replace('-', "_"))
}

fn chunk(url: &str, text: &str, chunk_index: usize) -> DocumentChunkPayload {
    DocumentChunkPayload {
        url: url.to_string(),
        canonical_url: url.to_string(),
        title: Some("Example".to_string()),
        text: text.to_string(),
        chunk_index,
        crawl_session_id: None,
        indexed_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
async fn test_qdrant_connection_and_collection_creation() {
    let collection = test_collection_name("connection");
    let client = QdrantClient::new(&get_test_qdrant_url(), collection)
        .await
        .expect("Failed to create Qdrant client");

    client.ensure_collection(4).await.expect("Failed to create collection");
    // calling twice must be a no-op, not an error
    client.ensure_collection(4).await.expect("ensure_collection should be idempotent");
}

#[tokio::test]
#[ignore]
async fn test_qdrant_insert_and_search() {
    let collection = test_collection_name("search");
    let client = QdrantClient::new(&get_test_qdrant_url(), collection).await.unwrap();
    client.ensure_collection(4).await.unwrap();

    let id = Uuid::new_v4();
    client
        .upsert_chunks(vec![(id, vec![0.1, 0.2, 0.3, 0.4], chunk("https://example.com/a", "hello world", 0))])
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let results = client
        .search(vec![0.1, 0.2, 0.3, 0.4], 5, &SearchFilters::default())
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].url, "https://example.com/a");
}

#[tokio::test]
#[ignore]
async fn test_qdrant_filters_by_canonical_url() {
    let collection = test_collection_name("filter");
    let client = QdrantClient::new(&get_test_qdrant_url(), collection).await.unwrap();
    client.ensure_collection(4).await.unwrap();

    client
        .upsert_chunks(vec![
            (Uuid::new_v4(), vec![0.1, 0.2, 0.3, 0.4], chunk("https://example.com/a", "alpha content", 0)),
            (Uuid::new_v4(), vec![0.5, 0.6, 0.7, 0.8], chunk("https://example.com/b", "beta content", 0)),
        ])
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let filters = SearchFilters {
        canonical_url: Some("https://example.com/a".to_string()),
        ..Default::default()
    };
    let results = client.search(vec![0.1, 0.2, 0.3, 0.4], 5, &filters).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://example.com/a");
}
