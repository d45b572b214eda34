//! Hybrid search: parallel vector + BM25 fan-out, fused by reciprocal rank.

pub mod bm25;
pub mod fusion;
pub mod orchestrator;
pub mod vector;

pub use bm25::Bm25Engine;
pub use orchestrator::SearchOrchestrator;
