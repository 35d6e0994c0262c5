// Store abstractions: document/metadata database and ANN vector index

pub mod document;
pub mod vector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reference::types::{DeckRecord, SlideRecord};
use crate::reference::ReferenceResult;

pub use document::DocumentStoreClient;
pub use vector::AnnIndexClient;

/// Restrict label namespaces attached to every vector datapoint.
pub const NS_DECK_ID: &str = "deck_id";
pub const NS_OWNER_ID: &str = "owner_id";
pub const NS_VISIBILITY: &str = "visibility";

/// Provider limit: values per `in` clause / ids per lookup.
pub const IN_CLAUSE_LIMIT: usize = 10;
/// Provider limit: datapoints per vector-index upsert or delete request.
pub const VECTOR_BATCH_LIMIT: usize = 100;

/// Label-based filter attached to a vector query or datapoint; values
/// inside one namespace are OR-ed, namespaces are AND-ed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrict {
    pub namespace: String,
    pub allow_list: Vec<String>,
}

impl Restrict {
    pub fn new(namespace: &str, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            allow_list: vec![value.into()],
        }
    }
}

/// One record as the vector index sees it.
#[derive(Debug, Clone)]
pub struct VectorDatapoint {
    pub id: String,
    pub embedding: Vec<f32>,
    pub restricts: Vec<Restrict>,
}

/// A nearest-neighbor hit, distance in the deployed index's metric.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// Server-side predicate set for metadata queries. Only equality and
/// `in` are expressible; `in` values per field are capped at
/// [`IN_CLAUSE_LIMIT`] by the provider, so callers batch and union.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlideFilter {
    pub equals: Vec<(String, serde_json::Value)>,
    pub any_of: Vec<(String, Vec<serde_json::Value>)>,
}

impl SlideFilter {
    pub fn eq(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn one_of(mut self, field: &str, values: Vec<serde_json::Value>) -> Self {
        self.any_of.push((field.to_string(), values));
        self
    }

    /// Translate vector-index restrict labels into the equivalent
    /// metadata predicates, so the brute-force path and the metadata
    /// search path scope records exactly like the ANN path does.
    pub fn from_restricts(restricts: &[Restrict]) -> Self {
        let mut filter = Self::default();
        for restrict in restricts {
            let field = match restrict.namespace.as_str() {
                NS_DECK_ID => "deckId",
                NS_OWNER_ID => "ownerId",
                NS_VISIBILITY => "visibility",
                other => {
                    tracing::warn!("Ignoring unknown restrict namespace: {}", other);
                    continue;
                }
            };
            match restrict.allow_list.as_slice() {
                [] => {}
                [single] => filter = filter.eq(field, single.clone()),
                many => {
                    filter = filter.one_of(
                        field,
                        many.iter().cloned().map(serde_json::Value::String).collect(),
                    )
                }
            }
        }
        filter
    }
}

/// Document database holding slide and deck records. Authoritative for
/// existence: a record absent here is gone, whatever the vector index
/// still holds.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write one deck record.
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()>;

    /// Batched write of slide records.
    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()>;

    async fn get_deck(&self, deck_id: &str) -> ReferenceResult<Option<DeckRecord>>;

    /// Fetch slides by id. Callers pass at most [`IN_CLAUSE_LIMIT`] ids
    /// per call; records that no longer exist are simply absent.
    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>>;

    /// Server-side filtered query, bounded by `limit`.
    async fn query_slides(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>>;

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>>;

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>>;

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>>;

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()>;

    async fn delete_deck(&self, deck_id: &str) -> ReferenceResult<()>;
}

/// External ANN service. Callers may pass any number of datapoints or
/// ids; implementations split provider requests into chunks of at most
/// [`VECTOR_BATCH_LIMIT`] internally. Duplicate-id upsert is
/// last-write-wins.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, points: &[VectorDatapoint]) -> ReferenceResult<()>;

    async fn find_neighbors(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<Neighbor>>;

    async fn remove(&self, ids: &[String]) -> ReferenceResult<()>;
}
