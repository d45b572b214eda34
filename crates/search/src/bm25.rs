//! In-process BM25 lexical index (spec §4.3 step 5, §6's BM25 engine contract).
//!
//! Incremental document frequencies so a re-index of a `doc_id` replaces its
//! postings without rebuilding the whole index, matching the "one logical
//! index per deployment, atomic replace per doc_id" requirement in spec §5.

use std::collections::{HashMap, HashSet};

use bridge_common::types::{BackendHit, SearchFilters};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Metadata carried alongside a BM25 posting, independent of the tokens used
/// to score it.
#[derive(Debug, Clone)]
pub struct Bm25Metadata {
    pub url: String,
    pub canonical_url: String,
    pub title: Option<String>,
    pub text: String,
    pub chunk_index: Option<usize>,
    pub crawl_session_id: Option<String>,
}

struct Posting {
    term_counts: HashMap<String, u32>,
    length: usize,
    metadata: Bm25Metadata,
}

#[derive(Default)]
struct Bm25State {
    docs: HashMap<String, Posting>,
    document_freq: HashMap<String, u32>,
    total_length: u64,
}

pub struct Bm25Engine {
    state: RwLock<Bm25State>,
}

impl Default for Bm25Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Engine {
    pub fn new() -> Self {
        Self { state: RwLock::new(Bm25State::default()) }
    }

    /// `stable_hash(canonical_url)` for the BM25/vector doc_id (spec §4.3 step 5).
    pub fn stable_hash(canonical_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(|s| s.to_string())
            .collect()
    }

    /// Replace-or-insert semantics keyed by `doc_id` (spec §6 BM25 contract).
    pub async fn index(&self, doc_id: &str, tokens: &[String], metadata: Bm25Metadata) {
        let mut state = self.state.write().await;

        if let Some(old) = state.docs.remove(doc_id) {
            state.total_length -= old.length as u64;
            for term in old.term_counts.keys() {
                if let Some(count) = state.document_freq.get_mut(term) {
                    *count -= 1;
                    if *count == 0 {
                        state.document_freq.remove(term);
                    }
                }
            }
        }

        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        let unique_terms: HashSet<&String> = term_counts.keys().collect();
        for term in unique_terms {
            *state.document_freq.entry(term.clone()).or_insert(0) += 1;
        }

        state.total_length += tokens.len() as u64;
        state.docs.insert(
            doc_id.to_string(),
            Posting { term_counts, length: tokens.len(), metadata },
        );
    }

    pub async fn remove(&self, doc_id: &str) {
        let mut state = self.state.write().await;
        if let Some(old) = state.docs.remove(doc_id) {
            state.total_length -= old.length as u64;
            for term in old.term_counts.keys() {
                if let Some(count) = state.document_freq.get_mut(term) {
                    *count -= 1;
                    if *count == 0 {
                        state.document_freq.remove(term);
                    }
                }
            }
        }
    }

    pub async fn search(&self, query: &str, limit: usize, filters: &SearchFilters) -> Vec<BackendHit> {
        let state = self.state.read().await;
        if state.docs.is_empty() {
            return Vec::new();
        }
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let total_docs = state.docs.len() as f32;
        let avg_doc_len = if total_docs > 0.0 { state.total_length as f32 / total_docs } else { 0.0 };

        let mut scored: Vec<(String, f32, &Posting)> = state
            .docs
            .iter()
            .filter(|(_, posting)| passes_filters(&posting.metadata, filters))
            .map(|(doc_id, posting)| {
                let doc_length = posting.length as f32;
                let mut score = 0.0f32;
                for term in &query_terms {
                    let tf = *posting.term_counts.get(term).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let df = *state.document_freq.get(term).unwrap_or(&0) as f32;
                    let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let denom = tf + K1 * (1.0 - B + B * doc_length / avg_doc_len.max(1.0));
                    score += idf * (tf * (K1 + 1.0)) / denom;
                }
                (doc_id.clone(), score, posting)
            })
            .filter(|(_, score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(doc_id, score, posting)| BackendHit {
                id: doc_id,
                url: posting.metadata.url.clone(),
                canonical_url: Some(posting.metadata.canonical_url.clone()),
                title: posting.metadata.title.clone(),
                text: posting.metadata.text.clone(),
                score: score as f64,
                chunk_index: posting.metadata.chunk_index,
            })
            .collect()
    }
}

fn passes_filters(metadata: &Bm25Metadata, filters: &SearchFilters) -> bool {
    if let Some(canonical_url) = &filters.canonical_url {
        if &metadata.canonical_url != canonical_url {
            return false;
        }
    }
    if let Some(crawl_session_id) = &filters.crawl_session_id {
        if metadata.crawl_session_id.as_deref() != Some(crawl_session_id.as_str()) {
            return false;
        }
    }
    if let Some(host) = &filters.host {
        if !metadata.url.contains(host) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(url: &str, text: &str) -> Bm25Metadata {
        Bm25Metadata {
            url: url.to_string(),
            canonical_url: url.to_string(),
            title: None,
            text: text.to_string(),
            chunk_index: Some(0),
            crawl_session_id: None,
        }
    }

    #[tokio::test]
    async fn replace_overwrites_prior_posting() {
        let engine = Bm25Engine::new();
        let id = Bm25Engine::stable_hash("https://example.com/a");
        engine
            .index(&id, &Bm25Engine::tokenize("the quick brown fox"), meta("https://example.com/a", "the quick brown fox"))
            .await;
        engine
            .index(&id, &Bm25Engine::tokenize("completely different content"), meta("https://example.com/a", "completely different content"))
            .await;

        let results = engine.search("quick", 10, &SearchFilters::default()).await;
        assert!(results.is_empty(), "stale posting should not match after replacement");

        let results = engine.search("different", 10, &SearchFilters::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "completely different content");
    }

    #[tokio::test]
    async fn search_ranks_by_term_frequency() {
        let engine = Bm25Engine::new();
        engine
            .index(
                "doc-1",
                &Bm25Engine::tokenize("rust rust rust programming"),
                meta("https://example.com/rust", "rust rust rust programming"),
            )
            .await;
        engine
            .index(
                "doc-2",
                &Bm25Engine::tokenize("rust is a language"),
                meta("https://example.com/lang", "rust is a language"),
            )
            .await;

        let results = engine.search("rust", 10, &SearchFilters::default()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://example.com/rust");
    }

    #[tokio::test]
    async fn filters_by_canonical_url() {
        let engine = Bm25Engine::new();
        engine.index("doc-1", &Bm25Engine::tokenize("hello world"), meta("https://example.com/a", "hello world")).await;
        engine.index("doc-2", &Bm25Engine::tokenize("hello world"), meta("https://example.com/b", "hello world")).await;

        let filters = SearchFilters { canonical_url: Some("https://example.com/a".to_string()), ..Default::default() };
        let results = engine.search("hello", 10, &filters).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/a");
    }
}
