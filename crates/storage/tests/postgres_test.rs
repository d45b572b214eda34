use bridge_storage::PostgresClient;
use chrono::Utc;
use uuid::Uuid;

fn get_test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set (use docker-compose.test.yml)")
}

async fn setup_test_db() -> PostgresClient {
    let client = PostgresClient::new(&get_test_db_url(), 5)
        .await
        .expect("Failed to connect to test database");
    client.run_migrations().await.expect("Failed to run migrations");
    client
}

#[tokio::test]
#[ignore]
async fn test_postgres_connection() {
    let client = setup_test_db().await;
    assert!(client.pool().acquire().await.is_ok());
}

#[tokio::test]
#[ignore]
async fn test_crawl_lifecycle_aggregation() {
    let client = setup_test_db().await;
    let job_id = format!("test-crawl-{}", Uuid::new_v4());

    client
        .upsert_crawl_started(&job_id, Some("https://example.com"), Utc::now(), Some(Utc::now()))
        .await
        .expect("failed to start crawl");

    // re-delivery of the same started event must not create a second row
    client
        .upsert_crawl_started(&job_id, Some("https://example.com"), Utc::now(), Some(Utc::now()))
        .await
        .expect("idempotent re-delivery should not fail");

    client
        .insert_operation_metric(
            "chunking",
            "chunk_document",
            120,
            true,
            None,
            Some(&job_id),
            Some("https://example.com/a"),
            serde_json::json!({}),
        )
        .await
        .unwrap();
    client
        .insert_operation_metric(
            "qdrant",
            "upsert_chunks",
            80,
            true,
            None,
            Some(&job_id),
            Some("https://example.com/a"),
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let session = client.complete_crawl(&job_id, Utc::now()).await.unwrap();
    assert_eq!(session.total_pages, 1);
    assert_eq!(session.pages_indexed, 1);
    assert_eq!(session.pages_failed, 0);
    assert_eq!(session.total_chunking_ms, 120);
    assert_eq!(session.total_vector_ms, 80);

    sqlx::query("DELETE FROM crawl_sessions WHERE job_id = $1")
        .bind(&job_id)
        .execute(client.pool())
        .await
        .ok();
}

#[tokio::test]
#[ignore]
async fn test_scraped_content_upsert_is_keyed_by_url_and_crawl() {
    let client = setup_test_db().await;
    let job_id = format!("test-crawl-{}", Uuid::new_v4());
    client
        .upsert_crawl_started(&job_id, Some("https://example.com"), Utc::now(), None)
        .await
        .unwrap();

    let id1 = client
        .upsert_scraped_content(
            &job_id,
            "https://example.com/a",
            "https://example.com/a",
            None,
            "scraper",
            "first version",
            None,
            None,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        )
        .await
        .unwrap();

    let id2 = client
        .upsert_scraped_content(
            &job_id,
            "https://example.com/a",
            "https://example.com/a",
            None,
            "scraper",
            "second version",
            None,
            None,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(id1, id2, "re-delivery for the same (url, crawl) should update, not duplicate");

    let rows = client.get_content_by_canonical_url("https://example.com/a", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].markdown, "second version");

    sqlx::query("DELETE FROM crawl_sessions WHERE job_id = $1")
        .bind(&job_id)
        .execute(client.pool())
        .await
        .ok();
}

#[tokio::test]
#[ignore]
async fn test_rescrape_claim_is_at_most_once() {
    let client = setup_test_db().await;
    let id = client
        .insert_change_event("https://example.com/changed", Some("watch-1"), serde_json::json!({}))
        .await
        .unwrap();

    let first = client.claim_rescrape(id, Utc::now()).await.unwrap();
    let second = client.claim_rescrape(id, Utc::now()).await.unwrap();

    assert!(first);
    assert!(!second, "a queued->in_progress claim must be exclusive");

    sqlx::query("DELETE FROM change_events WHERE id = $1")
        .bind(id)
        .execute(client.pool())
        .await
        .ok();
}

#[tokio::test]
#[ignore]
async fn test_sweep_zombie_rescrapes() {
    let client = setup_test_db().await;
    let id = client
        .insert_change_event("https://example.com/stuck", None, serde_json::json!({}))
        .await
        .unwrap();
    client.claim_rescrape(id, Utc::now() - chrono::Duration::hours(2)).await.unwrap();

    let cleared = client.sweep_zombie_rescrapes(Utc::now() - chrono::Duration::hours(1)).await.unwrap();
    assert!(cleared >= 1);

    let event = client.get_change_event(id).await.unwrap().unwrap();
    assert_eq!(event.rescrape_status.as_str(), "failed");

    sqlx::query("DELETE FROM change_events WHERE id = $1")
        .bind(id)
        .execute(client.pool())
        .await
        .ok();
}
