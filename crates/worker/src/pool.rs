//! The one intentional process-wide singleton: long-lived clients shared by
//! every task in a worker process (spec §5 "service pool").

use std::sync::Arc;

use async_trait::async_trait;
use bridge_common::{BatchJob, BridgeConfig, BridgeError, Embedder, IndexQueue, Result};
use bridge_indexing::embedder::EmbeddingClient;
use bridge_indexing::pipeline::IndexingPipeline;
use bridge_search::bm25::Bm25Engine;
use bridge_search::orchestrator::SearchOrchestrator;
use bridge_search::vector::VectorSearch;
use bridge_storage::{PostgresClient, QdrantClient, RedisCache};
use tokio::sync::mpsc;

const COLLECTION_NAME: &str = "bridge_documents";

/// Must match the embedding service's output dimensionality (spec §3
/// `DocumentChunk` invariant). Not one of spec §6's named config keys, so
/// it's fixed here rather than invented as a new env var — see DESIGN.md.
const VECTOR_DIMENSION: u64 = 768;

pub struct ServicePool {
    pub postgres: Arc<PostgresClient>,
    pub qdrant: Arc<QdrantClient>,
    pub redis: Arc<RedisCache>,
    pub bm25: Arc<Bm25Engine>,
    pub embedder: Arc<dyn Embedder>,
    pub pipeline: Arc<IndexingPipeline>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub worker_batch_size: usize,
    queue_tx: mpsc::UnboundedSender<BatchJob>,
}

impl ServicePool {
    pub async fn new(config: &BridgeConfig) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<BatchJob>)> {
        let postgres = Arc::new(PostgresClient::new(&config.database_url, config.db_pool_size).await?);
        postgres.run_migrations().await?;

        let qdrant = Arc::new(QdrantClient::new(&config.vector_url, COLLECTION_NAME).await?);
        qdrant.ensure_collection(VECTOR_DIMENSION).await?;

        let redis = Arc::new(RedisCache::new(&config.redis_url, config.content_cache_ttl_seconds).await?);
        let bm25 = Arc::new(Bm25Engine::new());
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(config.embed_url.clone())?);

        let pipeline = Arc::new(IndexingPipeline::new(
            postgres.clone(),
            qdrant.clone(),
            redis.clone(),
            bm25.clone(),
            embedder.clone(),
            config.tracking_param_strip,
        ));

        let vector_search: Arc<dyn VectorSearch> = qdrant.clone();
        let orchestrator = Arc::new(SearchOrchestrator::new(vector_search, bm25.clone(), embedder.clone()));

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let pool = Arc::new(Self {
            postgres,
            qdrant,
            redis,
            bm25,
            embedder,
            pipeline,
            orchestrator,
            worker_batch_size: config.worker_batch_size,
            queue_tx,
        });
        Ok((pool, queue_rx))
    }
}

#[async_trait]
impl IndexQueue for ServicePool {
    async fn enqueue_batch(&self, job: BatchJob) -> Result<()> {
        self.queue_tx
            .send(job)
            .map_err(|_| BridgeError::ServiceUnavailable("indexing queue is closed".to_string()))
    }
}
