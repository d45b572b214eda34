//! Storage adapters: Postgres for durable state, Qdrant for dense vectors,
//! Redis for the content read-through cache.

pub mod postgres;
pub mod qdrant;
pub mod redis;

pub use self::postgres::{CrawlAggregates, PostgresClient};
pub use self::qdrant::QdrantClient;
pub use self::redis::RedisCache;
