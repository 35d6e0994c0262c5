// Indexing pipeline: embedding + classification + dual-write, plus
// the delete/cascade paths

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::reference::classifier::SlideClassifier;
use crate::reference::embedding::Embedder;
use crate::reference::repository::SlideRepository;
use crate::reference::types::{
    DeckRecord, IndexDeckOutcome, SlideClassification, SlideRecord, SlideSource, Visibility,
};
use crate::reference::{ReferenceError, ReferenceResult};

pub struct IndexingPipeline {
    embedder: Arc<dyn Embedder>,
    classifier: Option<Arc<dyn SlideClassifier>>,
    repository: Arc<dyn SlideRepository>,
}

impl IndexingPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        classifier: Option<Arc<dyn SlideClassifier>>,
        repository: Arc<dyn SlideRepository>,
    ) -> Self {
        Self {
            embedder,
            classifier,
            repository,
        }
    }

    /// Index a full deck of slide images for one owner.
    ///
    /// Embedding failures abort the call; classification failures do
    /// not — the affected slide is indexed without classification.
    pub async fn index_deck(
        &self,
        deck_name: &str,
        slides: &[SlideSource],
        owner_id: &str,
        visibility: Visibility,
    ) -> ReferenceResult<IndexDeckOutcome> {
        if slides.is_empty() {
            return Err(ReferenceError::InvalidRequest(
                "deck has no slides to index".to_string(),
            ));
        }

        let deck_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Indexing deck '{}' ({} slides) for owner {} as {}",
            deck_name,
            slides.len(),
            owner_id,
            visibility
        );

        let locators: Vec<String> = slides.iter().map(|s| s.image_locator.clone()).collect();
        let embeddings = self.embedder.embed_image_batch(&locators).await?;

        let classifications = self.classify_best_effort(&locators).await;

        let now = Utc::now();
        let deck = DeckRecord {
            id: deck_id.clone(),
            name: deck_name.to_string(),
            owner_id: owner_id.to_string(),
            visibility,
            slide_count: slides.len(),
            created_at: now,
        };

        let records: Vec<SlideRecord> = slides
            .iter()
            .zip(embeddings)
            .zip(classifications)
            .enumerate()
            .map(|(index, ((source, embedding), classification))| SlideRecord {
                id: Uuid::new_v4().to_string(),
                deck_id: deck_id.clone(),
                deck_name: deck_name.to_string(),
                slide_index: index,
                image_locator: source.image_locator.clone(),
                owner_id: owner_id.to_string(),
                visibility,
                embedding,
                created_at: now,
                classification,
            })
            .collect();

        self.repository.put_deck(&deck).await?;
        self.repository.put_slides(&records).await?;

        Ok(IndexDeckOutcome {
            deck_id,
            deck_name: deck_name.to_string(),
            slides_indexed: records.len(),
        })
    }

    /// Ad-hoc single-slide indexing outside a full deck upload.
    pub async fn index_slide(
        &self,
        deck_name: &str,
        slide: SlideSource,
        owner_id: &str,
        visibility: Visibility,
    ) -> ReferenceResult<IndexDeckOutcome> {
        self.index_deck(deck_name, std::slice::from_ref(&slide), owner_id, visibility)
            .await
    }

    /// Delete one slide. Idempotent: deleting an already-deleted id is
    /// a no-op that still succeeds.
    pub async fn delete_slide(&self, slide_id: &str) -> ReferenceResult<()> {
        self.repository
            .delete_slides(std::slice::from_ref(&slide_id.to_string()))
            .await
    }

    /// Delete a deck and every slide in it.
    pub async fn delete_deck(&self, deck_id: &str) -> ReferenceResult<usize> {
        let ids = self.repository.slide_ids_for_deck(deck_id).await?;
        self.repository.delete_slides(&ids).await?;
        self.repository.delete_deck_record(deck_id).await?;
        tracing::info!("Deleted deck {} with {} slides", deck_id, ids.len());
        Ok(ids.len())
    }

    /// Delete every slide an owner has indexed, used when a user clears
    /// their reference library. Their deck records go too.
    pub async fn delete_user_slides(&self, owner_id: &str) -> ReferenceResult<usize> {
        let ids = self.repository.slide_ids_for_owner(owner_id).await?;
        self.repository.delete_slides(&ids).await?;

        for deck_id in self.repository.deck_ids_for_owner(owner_id).await? {
            self.repository.delete_deck_record(&deck_id).await?;
        }
        tracing::info!("Deleted {} slides for owner {}", ids.len(), owner_id);
        Ok(ids.len())
    }

    async fn classify_best_effort(&self, locators: &[String]) -> Vec<Option<SlideClassification>> {
        let Some(classifier) = &self.classifier else {
            tracing::debug!("No classifier configured; indexing without classification metadata");
            return vec![None; locators.len()];
        };

        let futures = locators
            .iter()
            .map(|locator| classifier.classify(locator));
        let results = join_all(futures).await;

        results
            .into_iter()
            .zip(locators)
            .map(|(result, locator)| match result {
                Ok(classification) => Some(classification),
                Err(e) => {
                    tracing::warn!(
                        "Classification failed for {}; indexing slide without metadata: {}",
                        locator,
                        e
                    );
                    None
                }
            })
            .collect()
    }
}
