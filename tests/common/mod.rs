// In-memory doubles for the two stores and the two model endpoints

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use slideref::reference::classifier::SlideClassifier;
use slideref::reference::embedding::Embedder;
use slideref::reference::repository::cosine_similarity;
use slideref::reference::store::{
    MetadataStore, Neighbor, Restrict, SlideFilter, VectorDatapoint, VectorIndex, IN_CLAUSE_LIMIT,
};
use slideref::reference::types::{DeckRecord, SlideClassification, SlideRecord};
use slideref::reference::{ReferenceError, ReferenceResult};

/// Metadata store backed by hash maps. Enforces the same request-shape
/// limits as the real provider so oversized calls fail tests loudly.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    slides: Mutex<HashMap<String, SlideRecord>>,
    decks: Mutex<HashMap<String, DeckRecord>>,
    pub query_count: AtomicUsize,
    pub lookup_count: AtomicUsize,
}

impl InMemoryMetadataStore {
    pub fn slide_count(&self) -> usize {
        self.slides.lock().unwrap().len()
    }

    pub fn deck_count(&self) -> usize {
        self.decks.lock().unwrap().len()
    }
}

/// Resolve a dotted field path against the record's JSON form.
fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn matches_filter(record: &SlideRecord, filter: &SlideFilter) -> bool {
    let json = serde_json::to_value(record).unwrap();
    for (field, wanted) in &filter.equals {
        if lookup_path(&json, field) != Some(wanted) {
            return false;
        }
    }
    for (field, values) in &filter.any_of {
        assert!(
            values.len() <= IN_CLAUSE_LIMIT,
            "in clause exceeds provider limit: {} values on {}",
            values.len(),
            field
        );
        match lookup_path(&json, field) {
            Some(actual) if values.contains(actual) => {}
            _ => return false,
        }
    }
    true
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()> {
        self.decks
            .lock()
            .unwrap()
            .insert(deck.id.clone(), deck.clone());
        Ok(())
    }

    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()> {
        let mut map = self.slides.lock().unwrap();
        for slide in slides {
            map.insert(slide.id.clone(), slide.clone());
        }
        Ok(())
    }

    async fn get_deck(&self, deck_id: &str) -> ReferenceResult<Option<DeckRecord>> {
        Ok(self.decks.lock().unwrap().get(deck_id).cloned())
    }

    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if ids.len() > IN_CLAUSE_LIMIT {
            return Err(ReferenceError::MetadataStore(format!(
                "id lookup exceeds provider limit: {} ids",
                ids.len()
            )));
        }
        let map = self.slides.lock().unwrap();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn query_slides(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        let map = self.slides.lock().unwrap();
        let mut matched: Vec<SlideRecord> = map
            .values()
            .filter(|record| matches_filter(record, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>> {
        let map = self.slides.lock().unwrap();
        let mut ids: Vec<String> = map
            .values()
            .filter(|r| r.deck_id == deck_id)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        let map = self.slides.lock().unwrap();
        let mut ids: Vec<String> = map
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        let map = self.decks.lock().unwrap();
        let mut ids: Vec<String> = map
            .values()
            .filter(|d| d.owner_id == owner_id)
            .map(|d| d.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()> {
        let mut map = self.slides.lock().unwrap();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn delete_deck(&self, deck_id: &str) -> ReferenceResult<()> {
        self.decks.lock().unwrap().remove(deck_id);
        Ok(())
    }
}

/// Vector index double doing exact cosine scans, with a switch to make
/// deletes fail.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    points: Mutex<HashMap<String, VectorDatapoint>>,
    pub fail_removes: AtomicBool,
}

impl InMemoryVectorIndex {
    pub fn point_count(&self) -> usize {
        self.points.lock().unwrap().len()
    }
}

fn matches_restricts(point: &VectorDatapoint, restricts: &[Restrict]) -> bool {
    restricts.iter().all(|wanted| {
        point.restricts.iter().any(|have| {
            have.namespace == wanted.namespace
                && have
                    .allow_list
                    .iter()
                    .any(|value| wanted.allow_list.contains(value))
        })
    })
}

// Chunking to the provider batch limit happens inside VectorIndex
// implementations, so this double accepts requests of any size.
#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, points: &[VectorDatapoint]) -> ReferenceResult<()> {
        let mut map = self.points.lock().unwrap();
        for point in points {
            map.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn find_neighbors(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<Neighbor>> {
        let map = self.points.lock().unwrap();
        let mut neighbors: Vec<Neighbor> = map
            .values()
            .filter(|point| matches_restricts(point, restricts))
            .map(|point| Neighbor {
                id: point.id.clone(),
                distance: 1.0 - cosine_similarity(query, &point.embedding),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(top_k);
        Ok(neighbors)
    }

    async fn remove(&self, ids: &[String]) -> ReferenceResult<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(ReferenceError::Provider(
                "simulated vector-index outage".to_string(),
            ));
        }
        let mut map = self.points.lock().unwrap();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }
}

/// Deterministic embedder. Inputs with preset vectors get exactly those;
/// everything else hashes to a stable pseudo-vector.
pub struct StubEmbedder {
    dimension: usize,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_vector(self, input: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.vectors
            .lock()
            .unwrap()
            .insert(input.to_string(), vector);
        self
    }

    fn vector_for(&self, input: &str) -> Vec<f32> {
        if let Some(vector) = self.vectors.lock().unwrap().get(input) {
            return vector.clone();
        }
        let mut seed = input
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        (0..self.dimension)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_image(&self, locator: &str) -> ReferenceResult<Vec<f32>> {
        Ok(self.vector_for(locator))
    }

    async fn embed_text(&self, text: &str) -> ReferenceResult<Vec<f32>> {
        Ok(self.vector_for(text))
    }
}

/// Classifier double returning canned classifications, failing for
/// locators marked broken.
#[derive(Default)]
pub struct StubClassifier {
    classifications: Mutex<HashMap<String, SlideClassification>>,
    broken: Mutex<Vec<String>>,
}

impl StubClassifier {
    pub fn with_classification(self, locator: &str, classification: SlideClassification) -> Self {
        self.classifications
            .lock()
            .unwrap()
            .insert(locator.to_string(), classification);
        self
    }

    pub fn with_broken(self, locator: &str) -> Self {
        self.broken.lock().unwrap().push(locator.to_string());
        self
    }
}

#[async_trait]
impl SlideClassifier for StubClassifier {
    async fn classify(&self, locator: &str) -> ReferenceResult<SlideClassification> {
        if self.broken.lock().unwrap().iter().any(|b| b == locator) {
            return Err(ReferenceError::Provider(
                "simulated classifier failure".to_string(),
            ));
        }
        self.classifications
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| ReferenceError::Provider("no canned classification".to_string()))
    }
}
