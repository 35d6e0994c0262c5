// Slide repository facade over the two stores
//
// One interface, two concrete adapters: ANN-backed when the vector
// index is configured, brute-force over the metadata store when it is
// not. The capability check happens once at construction; nothing else
// in the engine branches on configuration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::reference::store::{
    MetadataStore, Restrict, SlideFilter, VectorDatapoint, VectorIndex, IN_CLAUSE_LIMIT,
    NS_DECK_ID, NS_OWNER_ID, NS_VISIBILITY,
};
use crate::reference::types::{DeckRecord, DistanceMetric, ScoredSlide, SlideRecord};
use crate::reference::ReferenceResult;

/// Candidate cap for the brute-force path; keeps the local fallback at
/// a bounded O(candidates) cost.
pub const LOCAL_CANDIDATE_LIMIT: usize = 500;

/// Unified view over the metadata store and the vector index.
///
/// Deletes are metadata-first: the metadata store is authoritative for
/// existence, so a failed vector-side delete degrades to a logged
/// warning and the record is already unreachable.
#[async_trait]
pub trait SlideRepository: Send + Sync {
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()>;

    /// Dual-write where applicable: one batched metadata write, then
    /// chunked vector upserts tagged with scope restricts.
    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()>;

    /// Chunked metadata join (≤ provider `in` limit per query); ids with
    /// no surviving metadata record are dropped.
    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>>;

    /// Nearest-neighbor query under restrict labels, joined back to
    /// metadata, scores normalized to "higher is better".
    async fn query_by_vector(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<ScoredSlide>>;

    async fn query_by_metadata(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>>;

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>>;

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>>;

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>>;

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()>;

    async fn delete_deck_record(&self, deck_id: &str) -> ReferenceResult<()>;
}

/// Pick the adapter the configuration supports.
pub fn build_repository(
    metadata: Arc<dyn MetadataStore>,
    vector: Option<Arc<dyn VectorIndex>>,
    metric: DistanceMetric,
) -> Arc<dyn SlideRepository> {
    match vector {
        Some(vector) => Arc::new(AnnSlideRepository {
            metadata,
            vector,
            metric,
        }),
        None => {
            tracing::warn!(
                "Vector index not configured; semantic search will use the local brute-force path"
            );
            Arc::new(LocalSlideRepository { metadata })
        }
    }
}

fn restricts_for_record(record: &SlideRecord) -> Vec<Restrict> {
    vec![
        Restrict::new(NS_DECK_ID, record.deck_id.clone()),
        Restrict::new(NS_OWNER_ID, record.owner_id.clone()),
        Restrict::new(NS_VISIBILITY, record.visibility.as_str()),
    ]
}

async fn join_slides_chunked(
    metadata: &dyn MetadataStore,
    ids: &[String],
) -> ReferenceResult<Vec<SlideRecord>> {
    let chunks = ids
        .chunks(IN_CLAUSE_LIMIT)
        .map(|chunk| metadata.slides_by_ids(chunk));
    let results = try_join_all(chunks).await?;
    Ok(results.into_iter().flatten().collect())
}

/// ANN-backed repository: dual-writes, sublinear vector queries.
pub struct AnnSlideRepository {
    metadata: Arc<dyn MetadataStore>,
    vector: Arc<dyn VectorIndex>,
    metric: DistanceMetric,
}

#[async_trait]
impl SlideRepository for AnnSlideRepository {
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()> {
        self.metadata.put_deck(deck).await
    }

    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()> {
        // Metadata first: a vector entry without metadata is inert, the
        // inverse would leave slides reachable only by metadata search.
        self.metadata.put_slides(slides).await?;

        let points: Vec<VectorDatapoint> = slides
            .iter()
            .map(|record| VectorDatapoint {
                id: record.id.clone(),
                embedding: record.embedding.clone(),
                restricts: restricts_for_record(record),
            })
            .collect();
        self.vector.upsert(&points).await
    }

    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>> {
        join_slides_chunked(self.metadata.as_ref(), ids).await
    }

    async fn query_by_vector(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<ScoredSlide>> {
        let neighbors = self.vector.find_neighbors(query, restricts, top_k).await?;
        if neighbors.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = neighbors.iter().map(|n| n.id.clone()).collect();
        let records = join_slides_chunked(self.metadata.as_ref(), &ids).await?;
        let mut by_id: HashMap<String, SlideRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();

        // Preserve neighbor order; a neighbor whose metadata record is
        // gone was deleted and silently drops out.
        Ok(neighbors
            .into_iter()
            .filter_map(|neighbor| {
                by_id.remove(&neighbor.id).map(|record| ScoredSlide {
                    record,
                    score: self.metric.similarity(neighbor.distance),
                })
            })
            .collect())
    }

    async fn query_by_metadata(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>> {
        self.metadata.query_slides(filter, limit).await
    }

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.slide_ids_for_deck(deck_id).await
    }

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.slide_ids_for_owner(owner_id).await
    }

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.deck_ids_for_owner(owner_id).await
    }

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.metadata.delete_slides(ids).await?;

        // Best-effort: the metadata delete already succeeded, so a
        // leftover vector entry can never surface in results.
        if let Err(e) = self.vector.remove(ids).await {
            tracing::warn!(
                "Consistency warning: vector-index delete failed for {} ids after metadata delete: {}",
                ids.len(),
                e
            );
        }
        Ok(())
    }

    async fn delete_deck_record(&self, deck_id: &str) -> ReferenceResult<()> {
        self.metadata.delete_deck(deck_id).await
    }
}

/// Brute-force repository: keeps the system functional without the
/// external ANN service at O(candidates) cost.
pub struct LocalSlideRepository {
    metadata: Arc<dyn MetadataStore>,
}

#[async_trait]
impl SlideRepository for LocalSlideRepository {
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()> {
        self.metadata.put_deck(deck).await
    }

    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()> {
        self.metadata.put_slides(slides).await
    }

    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>> {
        join_slides_chunked(self.metadata.as_ref(), ids).await
    }

    async fn query_by_vector(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<ScoredSlide>> {
        let filter = SlideFilter::from_restricts(restricts);
        let candidates = self
            .metadata
            .query_slides(&filter, LOCAL_CANDIDATE_LIMIT)
            .await?;

        let mut scored: Vec<ScoredSlide> = candidates
            .into_iter()
            .map(|record| {
                let score = cosine_similarity(query, &record.embedding);
                ScoredSlide { record, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn query_by_metadata(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>> {
        self.metadata.query_slides(filter, limit).await
    }

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.slide_ids_for_deck(deck_id).await
    }

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.slide_ids_for_owner(owner_id).await
    }

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        self.metadata.deck_ids_for_owner(owner_id).await
    }

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.metadata.delete_slides(ids).await
    }

    async fn delete_deck_record(&self, deck_id: &str) -> ReferenceResult<()> {
        self.metadata.delete_deck(deck_id).await
    }
}

/// Cosine similarity over raw (not necessarily normalized) vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical_and_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_scale_invariant() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_similarity_conversion() {
        assert!((DistanceMetric::Cosine.similarity(0.0) - 1.0).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.similarity(0.25) - 0.75).abs() < 1e-6);
        // Out-of-range distances clamp instead of producing negative scores.
        assert_eq!(DistanceMetric::Cosine.similarity(1.5), 0.0);
        assert_eq!(DistanceMetric::DotProduct.similarity(0.9), 0.9);
    }

    #[test]
    fn test_filter_from_restricts() {
        let restricts = vec![
            Restrict::new(NS_DECK_ID, "d1"),
            Restrict {
                namespace: NS_VISIBILITY.to_string(),
                allow_list: vec!["public".to_string(), "private".to_string()],
            },
        ];
        let filter = SlideFilter::from_restricts(&restricts);
        assert_eq!(filter.equals.len(), 1);
        assert_eq!(filter.equals[0].0, "deckId");
        assert_eq!(filter.any_of.len(), 1);
        assert_eq!(filter.any_of[0].0, "visibility");
        assert_eq!(filter.any_of[0].1.len(), 2);
    }
}
