//! Vector index abstraction for per-game collections.
//!
//! A collection is a named set of `(vector, text, metadata)` items. Writes
//! either replace a whole collection or append to its end, each as one
//! atomic step. Every vector in a collection has the same dimension.

use chrono::{DateTime, Utc};
use meeple_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// How an index measures distance between vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`
    Cosine,
    /// Euclidean distance, in `[0, inf)`
    L2,
}

/// Map a raw index distance to a relevance score in `[0, 1]`.
///
/// Monotonically non-increasing in `distance`. Non-finite distances score 0.
pub fn relevance_from_distance(distance: f32, metric: DistanceMetric) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }

    let relevance = match metric {
        DistanceMetric::Cosine => 1.0 - distance,
        DistanceMetric::L2 => 1.0 / (1.0 + distance.max(0.0)),
    };

    relevance.clamp(0.0, 1.0)
}

/// An item to store in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub distance: f32,
}

/// Summary of a stored collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
    /// Vector dimension, `None` while the collection is empty
    #[serde(default)]
    pub dimensions: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for vector index backends.
///
/// Implementations must:
/// - replace a collection atomically in `upsert_collection`
/// - return hits in ascending distance, ties in insertion order
/// - fail `query` with `AppError::CollectionNotFound` for unknown collections
/// - fail with `AppError::Index` when vector dimensions do not match
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Distance metric reported in `IndexHit::distance`.
    fn metric(&self) -> DistanceMetric;

    /// Create or replace a collection with exactly `items`.
    async fn upsert_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()>;

    /// Add `items` after the stored ones, creating the collection if needed.
    async fn append_to_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()>;

    /// Return up to `k` items closest to `vector`.
    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<IndexHit>>;

    async fn collection_exists(&self, name: &str) -> AppResult<bool>;

    /// Names of every collection, sorted.
    async fn list_collections(&self) -> AppResult<Vec<String>>;

    async fn collection_info(&self, name: &str) -> AppResult<Option<CollectionInfo>>;
}

/// Cosine distance; a zero vector is maximally distant from everything.
///
/// Vectors of different lengths come from different embedding models and
/// cannot be compared.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(dimension_mismatch(a.len(), b.len()));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }

    Ok(1.0 - dot_product / (norm_a * norm_b))
}

pub(crate) fn dimension_mismatch(got: usize, stored: usize) -> AppError {
    AppError::Index(format!(
        "Vector has {} dimensions but the collection stores {}; \
         re-ingest the game after changing the embedding model",
        got, stored
    ))
}

/// The single dimension shared by `items`, checked against `stored`.
pub(crate) fn batch_dimensions(items: &[IndexItem], stored: Option<usize>) -> AppResult<Option<usize>> {
    let mut dimensions = stored;
    for item in items {
        match dimensions {
            Some(d) if d != item.vector.len() => return Err(dimension_mismatch(item.vector.len(), d)),
            Some(_) => {}
            None => dimensions = Some(item.vector.len()),
        }
    }
    Ok(dimensions)
}

/// Rank `(position, distance)` pairs and keep the best `k`.
pub(crate) fn rank_by_distance<T>(mut scored: Vec<(usize, f32, T)>, k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored.into_iter().map(|(_, d, item)| (d, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_relevance() {
        assert_eq!(relevance_from_distance(0.0, DistanceMetric::Cosine), 1.0);
        assert!((relevance_from_distance(0.25, DistanceMetric::Cosine) - 0.75).abs() < 1e-6);
        // Opposite vectors clamp to zero
        assert_eq!(relevance_from_distance(1.7, DistanceMetric::Cosine), 0.0);
        // Rounding noise below zero clamps to one
        assert_eq!(relevance_from_distance(-1e-7, DistanceMetric::Cosine), 1.0);
    }

    #[test]
    fn test_l2_relevance() {
        assert_eq!(relevance_from_distance(0.0, DistanceMetric::L2), 1.0);
        assert_eq!(relevance_from_distance(1.0, DistanceMetric::L2), 0.5);
        assert!(relevance_from_distance(1000.0, DistanceMetric::L2) < 0.01);
    }

    #[test]
    fn test_relevance_is_monotonic() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let scores: Vec<f32> = (0..40)
                .map(|i| relevance_from_distance(i as f32 * 0.1, metric))
                .collect();
            assert!(scores.windows(2).all(|w| w[0] >= w[1]));
            assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn test_non_finite_distance() {
        assert_eq!(relevance_from_distance(f32::NAN, DistanceMetric::Cosine), 0.0);
        assert_eq!(relevance_from_distance(f32::INFINITY, DistanceMetric::L2), 0.0);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).unwrap().abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_cosine_distance_rejects_mismatched_dimensions() {
        let err = cosine_distance(&[1.0], &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
        assert!(err.to_string().contains("re-ingest"));
    }

    #[test]
    fn test_batch_dimensions() {
        let item = |len: usize| IndexItem {
            id: format!("go#{}", len),
            text: String::new(),
            metadata: serde_json::Value::Null,
            vector: vec![0.5; len],
        };

        assert_eq!(batch_dimensions(&[], None).unwrap(), None);
        assert_eq!(batch_dimensions(&[item(3), item(3)], None).unwrap(), Some(3));
        assert_eq!(batch_dimensions(&[], Some(4)).unwrap(), Some(4));
        assert!(batch_dimensions(&[item(3), item(4)], None).is_err());
        assert!(batch_dimensions(&[item(3)], Some(4)).is_err());
    }

    #[test]
    fn test_rank_breaks_ties_by_position() {
        let ranked = rank_by_distance(vec![(2, 0.1, "c"), (0, 0.3, "a"), (1, 0.1, "b")], 2);
        assert_eq!(ranked, vec![(0.1, "b"), (0.1, "c")]);
    }
}
