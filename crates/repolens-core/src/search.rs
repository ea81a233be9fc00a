//! Retrieval engine: brute-force cosine ranking over a repository's vectors.
//!
//! The algorithm works entirely through the [`Store`] trait. The caller
//! embeds the question and passes the query vector in.
//!
//! # Ranking
//!
//! 1. Load every [`VectorRecord`] for the repository, in insertion order.
//! 2. Score each with [`cosine_similarity`] against the query vector.
//! 3. Stable-sort by score, descending. Equal scores keep insertion order;
//!    there is no secondary key.
//! 4. Truncate to `k`.
//!
//! A repository with no vectors is an error ([`RepolensError::NoIndex`]),
//! not an empty result.

use anyhow::Result;

use crate::embedding::cosine_similarity;
use crate::error::RepolensError;
use crate::models::{RetrievalHit, VectorRecord};
use crate::store::Store;

/// Default number of hits returned by [`retrieve`].
pub const DEFAULT_TOP_K: usize = 5;

/// Rank `records` against `query` and keep the best `k`.
pub fn rank_vectors(query: &[f32], records: &[VectorRecord], k: usize) -> Vec<RetrievalHit> {
    let mut hits: Vec<RetrievalHit> = records
        .iter()
        .map(|r| RetrievalHit {
            path: r.path.clone(),
            chunk_index: r.chunk_index,
            preview: r.preview.clone(),
            score: cosine_similarity(query, &r.vector),
        })
        .collect();

    // Stable, total order: ties keep insertion order.
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    hits
}

/// Load a repository's vectors from `store` and return the top `k` hits.
pub async fn retrieve(
    store: &dyn Store,
    repo_id: &str,
    query: &[f32],
    k: usize,
) -> Result<Vec<RetrievalHit>> {
    let records = store.list_vectors(repo_id).await?;
    if records.is_empty() {
        return Err(RepolensError::NoIndex(repo_id.to_string()).into());
    }

    let mismatched = records
        .iter()
        .filter(|r| r.vector.len() != query.len())
        .count();
    if mismatched > 0 {
        tracing::warn!(
            repo_id,
            mismatched,
            query_dims = query.len(),
            "stored vectors with a different dimensionality score 0"
        );
    }

    Ok(rank_vectors(query, &records, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use chrono::Utc;

    fn record(path: &str, idx: i64, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: format!("{}#{}", path, idx),
            repo_id: "r1".into(),
            file_id: Some("f".into()),
            path: path.into(),
            chunk_index: idx,
            vector,
            preview: format!("preview of {}", path),
            content_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sorted_non_increasing() {
        let records = vec![
            record("a", 0, vec![0.0, 1.0]),
            record("b", 0, vec![1.0, 0.0]),
            record("c", 0, vec![1.0, 1.0]),
        ];
        let hits = rank_vectors(&[1.0, 0.0], &records, 5);
        let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, ["b", "c", "a"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_bounds() {
        let records: Vec<_> = (0..8)
            .map(|i| record("f", i, vec![1.0, i as f32]))
            .collect();
        assert_eq!(rank_vectors(&[1.0, 0.0], &records, 5).len(), 5);
        assert_eq!(rank_vectors(&[1.0, 0.0], &records[..3], 5).len(), 3);
        assert!(rank_vectors(&[1.0, 0.0], &records, 0).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let records = vec![
            record("first", 0, vec![2.0, 0.0]),
            record("low", 0, vec![0.0, 1.0]),
            record("second", 0, vec![1.0, 0.0]),
            record("third", 0, vec![5.0, 0.0]),
        ];
        let hits = rank_vectors(&[1.0, 0.0], &records, 3);
        let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, ["first", "second", "third"]);
    }

    #[test]
    fn test_non_finite_vectors_score_zero_and_rank_last() {
        let mut records = vec![
            record("nan", 0, vec![f32::NAN, 1.0]),
            record("hit", 0, vec![1.0, 0.0]),
            record("inf", 0, vec![f32::INFINITY, 0.0]),
            record("partial", 0, vec![1.0, 1.0]),
        ];
        for i in 0..40 {
            records.push(record("filler", i, vec![f32::NAN, i as f32]));
        }

        let hits = rank_vectors(&[1.0, 0.0], &records, 3);
        let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, ["hit", "partial", "nan"]);
        assert_eq!(hits[2].score, 0.0);
        assert!(hits.iter().all(|h| h.score.is_finite()));
    }

    #[test]
    fn test_hits_carry_origin() {
        let records = vec![record("src/a.js", 2, vec![1.0])];
        let hit = &rank_vectors(&[1.0], &records, 1)[0];
        assert_eq!(hit.path, "src/a.js");
        assert_eq!(hit.chunk_index, 2);
        assert_eq!(hit.preview, "preview of src/a.js");
        assert!((hit.score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_retrieve_without_vectors_is_no_index() {
        let store = InMemoryStore::new();
        let err = retrieve(&store, "r1", &[1.0], 5).await.unwrap_err();
        match err.downcast_ref::<RepolensError>() {
            Some(RepolensError::NoIndex(id)) => assert_eq!(id, "r1"),
            other => panic!("expected NoIndex, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retrieve_from_store() {
        let store = InMemoryStore::new();
        store.insert_vector(&record("a", 0, vec![0.0, 1.0])).await.unwrap();
        store.insert_vector(&record("b", 0, vec![1.0, 0.0])).await.unwrap();
        let hits = retrieve(&store, "r1", &[1.0, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "b");
    }
}
