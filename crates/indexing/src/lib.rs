//! Document indexing pipeline: URL canonicalization, chunking, embedding,
//! and dual-write into the vector and lexical search backends (spec §4.3).

pub mod canonical;
pub mod chunker;
pub mod embedder;
pub mod pipeline;

pub use embedder::EmbeddingClient;
pub use pipeline::IndexingPipeline;
