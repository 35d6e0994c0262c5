// REST adapter for the external document database
//
// The provider speaks a collection/document API with server-side
// equality and `in` predicates (at most IN_CLAUSE_LIMIT values per
// clause) and batched writes. Array-contains predicates exist but
// cannot be combined with other filters, so the coordinator evaluates
// those client-side instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MetadataStore, SlideFilter, IN_CLAUSE_LIMIT};
use crate::reference::types::{DeckRecord, SlideRecord};
use crate::reference::{ReferenceError, ReferenceResult};

const SLIDES_COLLECTION: &str = "slide_records";
const DECKS_COLLECTION: &str = "deck_records";

/// Upper bound on records pulled when listing ids for a cascade delete.
const CASCADE_PAGE_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteRequest {
    writes: Vec<DocumentWrite>,
}

#[derive(Debug, Serialize)]
struct DocumentWrite {
    id: String,
    fields: Value,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    filters: Vec<FieldPredicate>,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct FieldPredicate {
    field: String,
    op: &'static str,
    value: Value,
}

#[derive(Debug, Serialize)]
struct BatchDeleteRequest {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    documents: Vec<QueriedDocument>,
}

#[derive(Debug, Deserialize)]
struct QueriedDocument {
    #[allow(dead_code)]
    id: String,
    fields: Value,
}

impl DocumentStoreClient {
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn post(&self, url: &str, body: &impl Serialize) -> ReferenceResult<reqwest::Response> {
        let mut req = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| ReferenceError::MetadataStore(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReferenceError::MetadataStore(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        Ok(response)
    }

    fn predicates_for(filter: &SlideFilter) -> ReferenceResult<Vec<FieldPredicate>> {
        let mut predicates = Vec::new();
        for (field, value) in &filter.equals {
            predicates.push(FieldPredicate {
                field: field.clone(),
                op: "eq",
                value: value.clone(),
            });
        }
        for (field, values) in &filter.any_of {
            if values.len() > IN_CLAUSE_LIMIT {
                return Err(ReferenceError::MetadataStore(format!(
                    "`in` clause on {} carries {} values, provider limit is {}",
                    field,
                    values.len(),
                    IN_CLAUSE_LIMIT
                )));
            }
            predicates.push(FieldPredicate {
                field: field.clone(),
                op: "in",
                value: Value::Array(values.clone()),
            });
        }
        Ok(predicates)
    }

    async fn run_query(
        &self,
        collection: &str,
        filters: Vec<FieldPredicate>,
        limit: usize,
    ) -> ReferenceResult<Vec<Value>> {
        let url = format!(
            "{}/collections/{}/documents:query",
            self.base_url, collection
        );
        let response = self.post(&url, &QueryRequest { filters, limit }).await?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| ReferenceError::MetadataStore(e.to_string()))?;

        Ok(parsed.documents.into_iter().map(|d| d.fields).collect())
    }

    async fn batch_write(&self, collection: &str, writes: Vec<DocumentWrite>) -> ReferenceResult<()> {
        let url = format!(
            "{}/collections/{}/documents:batchWrite",
            self.base_url, collection
        );
        self.post(&url, &WriteRequest { writes }).await?;
        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: Vec<String>) -> ReferenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}/collections/{}/documents:batchDelete",
            self.base_url, collection
        );
        self.post(&url, &BatchDeleteRequest { ids }).await?;
        Ok(())
    }

    fn decode_slides(documents: Vec<Value>) -> ReferenceResult<Vec<SlideRecord>> {
        documents
            .into_iter()
            .map(|fields| {
                serde_json::from_value(fields)
                    .map_err(|e| ReferenceError::MetadataStore(format!("malformed slide record: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl MetadataStore for DocumentStoreClient {
    async fn put_deck(&self, deck: &DeckRecord) -> ReferenceResult<()> {
        let fields = serde_json::to_value(deck)
            .map_err(|e| ReferenceError::MetadataStore(e.to_string()))?;
        self.batch_write(
            DECKS_COLLECTION,
            vec![DocumentWrite {
                id: deck.id.clone(),
                fields,
            }],
        )
        .await
    }

    async fn put_slides(&self, slides: &[SlideRecord]) -> ReferenceResult<()> {
        if slides.is_empty() {
            return Ok(());
        }
        let writes = slides
            .iter()
            .map(|slide| {
                Ok(DocumentWrite {
                    id: slide.id.clone(),
                    fields: serde_json::to_value(slide)
                        .map_err(|e| ReferenceError::MetadataStore(e.to_string()))?,
                })
            })
            .collect::<ReferenceResult<Vec<_>>>()?;
        self.batch_write(SLIDES_COLLECTION, writes).await
    }

    async fn get_deck(&self, deck_id: &str) -> ReferenceResult<Option<DeckRecord>> {
        let filters = vec![FieldPredicate {
            field: "id".to_string(),
            op: "eq",
            value: Value::String(deck_id.to_string()),
        }];
        let mut documents = self.run_query(DECKS_COLLECTION, filters, 1).await?;
        match documents.pop() {
            Some(fields) => serde_json::from_value(fields)
                .map(Some)
                .map_err(|e| ReferenceError::MetadataStore(format!("malformed deck record: {}", e))),
            None => Ok(None),
        }
    }

    async fn slides_by_ids(&self, ids: &[String]) -> ReferenceResult<Vec<SlideRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > IN_CLAUSE_LIMIT {
            return Err(ReferenceError::MetadataStore(format!(
                "slides_by_ids called with {} ids, provider limit is {}",
                ids.len(),
                IN_CLAUSE_LIMIT
            )));
        }
        let filters = vec![FieldPredicate {
            field: "id".to_string(),
            op: "in",
            value: Value::Array(ids.iter().cloned().map(Value::String).collect()),
        }];
        let documents = self.run_query(SLIDES_COLLECTION, filters, ids.len()).await?;
        Self::decode_slides(documents)
    }

    async fn query_slides(
        &self,
        filter: &SlideFilter,
        limit: usize,
    ) -> ReferenceResult<Vec<SlideRecord>> {
        let predicates = Self::predicates_for(filter)?;
        let documents = self.run_query(SLIDES_COLLECTION, predicates, limit).await?;
        Self::decode_slides(documents)
    }

    async fn slide_ids_for_deck(&self, deck_id: &str) -> ReferenceResult<Vec<String>> {
        let filter = SlideFilter::default().eq("deckId", deck_id);
        let slides = self.query_slides(&filter, CASCADE_PAGE_LIMIT).await?;
        Ok(slides.into_iter().map(|s| s.id).collect())
    }

    async fn slide_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        let filter = SlideFilter::default().eq("ownerId", owner_id);
        let slides = self.query_slides(&filter, CASCADE_PAGE_LIMIT).await?;
        Ok(slides.into_iter().map(|s| s.id).collect())
    }

    async fn deck_ids_for_owner(&self, owner_id: &str) -> ReferenceResult<Vec<String>> {
        let filters = vec![FieldPredicate {
            field: "ownerId".to_string(),
            op: "eq",
            value: Value::String(owner_id.to_string()),
        }];
        let documents = self
            .run_query(DECKS_COLLECTION, filters, CASCADE_PAGE_LIMIT)
            .await?;
        documents
            .into_iter()
            .map(|fields| {
                serde_json::from_value::<DeckRecord>(fields)
                    .map(|deck| deck.id)
                    .map_err(|e| {
                        ReferenceError::MetadataStore(format!("malformed deck record: {}", e))
                    })
            })
            .collect()
    }

    async fn delete_slides(&self, ids: &[String]) -> ReferenceResult<()> {
        self.batch_delete(SLIDES_COLLECTION, ids.to_vec()).await
    }

    async fn delete_deck(&self, deck_id: &str) -> ReferenceResult<()> {
        self.batch_delete(DECKS_COLLECTION, vec![deck_id.to_string()])
            .await
    }
}
