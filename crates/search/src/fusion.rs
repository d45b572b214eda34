//! Reciprocal-rank fusion and cross-backend deduplication (spec §4.4).

use std::collections::HashMap;

use bridge_common::types::{BackendHit, ResultSource, SearchResult};

struct FusedEntry {
    hit: BackendHit,
    score: f64,
    in_vector: bool,
    in_bm25: bool,
    insertion_order: usize,
}

/// Dedup key, in order of preference: `canonical_url` → `url` → `id`
/// (spec §4.4 "Deduplication key").
fn dedup_key(hit: &BackendHit) -> String {
    hit.canonical_url.clone().unwrap_or_else(|| hit.url.clone())
}

/// Collapses repeated dedup keys within a single backend's ranked list down
/// to the occurrence with the best (lowest) rank, so a backend that returns
/// more than one hit for the same logical document only contributes once
/// (spec §8 invariant 6: one RRF term per backend per document).
fn best_rank_per_key(hits: &[BackendHit]) -> Vec<(String, usize, &BackendHit)> {
    let mut best: HashMap<String, (usize, &BackendHit)> = HashMap::new();
    for (rank, hit) in hits.iter().enumerate() {
        let key = dedup_key(hit);
        best.entry(key).and_modify(|(best_rank, best_hit)| {
            if rank < *best_rank {
                *best_rank = rank;
                *best_hit = hit;
            }
        }).or_insert((rank, hit));
    }
    let mut collapsed: Vec<(String, usize, &BackendHit)> =
        best.into_iter().map(|(key, (rank, hit))| (key, rank, hit)).collect();
    collapsed.sort_by_key(|(_, rank, _)| *rank);
    collapsed
}

/// Fuses two ranked backend result lists into one ranked, deduplicated list.
/// `k` is the RRF constant (spec default 60). Either input may be empty —
/// the orchestrator is responsible for calling this only with at least one
/// non-empty backend.
pub fn reciprocal_rank_fusion(
    vector_hits: &[BackendHit],
    bm25_hits: &[BackendHit],
    k: f64,
    limit: usize,
) -> Vec<SearchResult> {
    let mut entries: HashMap<String, FusedEntry> = HashMap::new();
    let mut next_insertion_order = 0usize;

    for (key, rank, hit) in best_rank_per_key(vector_hits) {
        let contribution = 1.0 / (k + (rank + 1) as f64);
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.score += contribution;
                entry.in_vector = true;
            }
            None => {
                entries.insert(
                    key,
                    FusedEntry {
                        hit: hit.clone(),
                        score: contribution,
                        in_vector: true,
                        in_bm25: false,
                        insertion_order: next_insertion_order,
                    },
                );
                next_insertion_order += 1;
            }
        }
    }

    for (key, rank, hit) in best_rank_per_key(bm25_hits) {
        let contribution = 1.0 / (k + (rank + 1) as f64);
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.score += contribution;
                entry.in_bm25 = true;
            }
            None => {
                entries.insert(
                    key,
                    FusedEntry {
                        hit: hit.clone(),
                        score: contribution,
                        in_vector: false,
                        in_bm25: true,
                        insertion_order: next_insertion_order,
                    },
                );
                next_insertion_order += 1;
            }
        }
    }

    let mut fused: Vec<FusedEntry> = entries.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| source_priority(a).cmp(&source_priority(b)))
            .then_with(|| a.insertion_order.cmp(&b.insertion_order))
    });

    fused
        .into_iter()
        .take(limit)
        .map(|entry| {
            let source = match (entry.in_vector, entry.in_bm25) {
                (true, true) => ResultSource::Hybrid,
                (true, false) => ResultSource::Vector,
                (false, true) => ResultSource::Bm25,
                (false, false) => unreachable!("fused entry must come from at least one backend"),
            };
            SearchResult {
                id: entry.hit.id,
                url: entry.hit.url,
                canonical_url: entry.hit.canonical_url.unwrap_or_default(),
                title: entry.hit.title,
                text: entry.hit.text,
                score: entry.score,
                source,
                chunk_index: entry.hit.chunk_index,
            }
        })
        .collect()
}

/// Lower sorts first: vector (0) outranks bm25-only (1) on a score tie.
fn source_priority(entry: &FusedEntry) -> u8 {
    if entry.in_vector {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, url: &str) -> BackendHit {
        BackendHit {
            id: id.to_string(),
            url: url.to_string(),
            canonical_url: Some(url.to_string()),
            title: None,
            text: format!("text for {id}"),
            score: 1.0,
            chunk_index: Some(0),
        }
    }

    #[test]
    fn scores_from_both_backends_sum() {
        let vector_hits = vec![hit("a", "https://example.com/a")];
        let bm25_hits = vec![hit("a", "https://example.com/a")];

        let results = reciprocal_rank_fusion(&vector_hits, &bm25_hits, 60.0, 10);
        assert_eq!(results.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((results[0].score - expected).abs() < 1e-9);
        assert_eq!(results[0].source, ResultSource::Hybrid);
    }

    #[test]
    fn dedups_by_canonical_url_across_backends() {
        let vector_hits = vec![hit("vec-id", "https://example.com/a?utm_source=x")];
        let mut bm25_hit = hit("bm25-id", "https://example.com/a?utm_source=x");
        bm25_hit.canonical_url = Some("https://example.com/a?utm_source=x".to_string());

        let results = reciprocal_rank_fusion(&vector_hits, &[bm25_hit], 60.0, 10);
        assert_eq!(results.len(), 1, "same canonical_url should fuse into one result");
    }

    #[test]
    fn vector_only_result_has_vector_source() {
        let vector_hits = vec![hit("a", "https://example.com/a")];
        let results = reciprocal_rank_fusion(&vector_hits, &[], 60.0, 10);
        assert_eq!(results[0].source, ResultSource::Vector);
    }

    #[test]
    fn ties_break_by_source_priority_then_insertion_order() {
        let vector_hits = vec![hit("v1", "https://example.com/v1")];
        let bm25_hits = vec![hit("b1", "https://example.com/b1")];
        // equal single-backend ranks produce equal scores; vector must win the tie.
        let results = reciprocal_rank_fusion(&vector_hits, &bm25_hits, 60.0, 10);
        assert_eq!(results[0].url, "https://example.com/v1");
        assert_eq!(results[1].url, "https://example.com/b1");
    }

    #[test]
    fn same_backend_duplicate_hits_contribute_once() {
        // Two chunks of the same document both land in one backend's top-K.
        let mut first = hit("a-chunk0", "https://example.com/a");
        first.chunk_index = Some(0);
        let mut second = hit("a-chunk1", "https://example.com/a");
        second.chunk_index = Some(1);
        let vector_hits = vec![first, second];

        let results = reciprocal_rank_fusion(&vector_hits, &[], 60.0, 10);
        assert_eq!(results.len(), 1);
        let expected = 1.0 / 61.0;
        assert!((results[0].score - expected).abs() < 1e-9, "only the best rank should contribute");
    }

    #[test]
    fn output_is_bounded_by_limit() {
        let vector_hits: Vec<BackendHit> =
            (0..10).map(|i| hit(&format!("v{i}"), &format!("https://example.com/{i}"))).collect();
        let results = reciprocal_rank_fusion(&vector_hits, &[], 60.0, 3);
        assert_eq!(results.len(), 3);
    }
}
