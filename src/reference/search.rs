// Retrieval coordinator: scope restriction, mode dispatch, ranking

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::reference::embedding::Embedder;
use crate::reference::filters::ClassificationFilters;
use crate::reference::repository::SlideRepository;
use crate::reference::store::{Restrict, SlideFilter, IN_CLAUSE_LIMIT, NS_DECK_ID, NS_OWNER_ID, NS_VISIBILITY};
use crate::reference::types::{QueryInput, ScoredSlide, SearchScope, Visibility};
use crate::reference::{ReferenceError, ReferenceResult};

/// Semantic over-fetch factor when a classification post-filter will
/// thin the result set afterwards.
pub const HYBRID_OVERFETCH_FACTOR: usize = 3;
/// Page size for metadata-only queries; array-tag predicates are
/// evaluated client-side on this page.
pub const METADATA_PAGE_LIMIT: usize = 100;
pub const DEFAULT_TOP_K: usize = 10;

/// The bounded two-state retry flow: one scoped pass, and at most one
/// forced-public retry when the scoped pass comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopePass {
    Scoped,
    PublicFallback,
}

/// A search request as the engine sees it, already validated by the API
/// layer for shape but not for emptiness.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub input: Option<QueryInput>,
    pub filters: Option<ClassificationFilters>,
    pub scope: SearchScope,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub total_results: usize,
    pub search_time_ms: u64,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub results: Vec<ScoredSlide>,
    pub query: QueryDescriptor,
    pub filters: Option<ClassificationFilters>,
    pub stats: SearchStats,
}

pub struct RetrievalCoordinator {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn SlideRepository>,
}

impl RetrievalCoordinator {
    pub fn new(embedder: Arc<dyn Embedder>, repository: Arc<dyn SlideRepository>) -> Self {
        Self {
            embedder,
            repository,
        }
    }

    pub async fn search(&self, request: SearchRequest) -> ReferenceResult<SearchOutcome> {
        let started = Instant::now();
        let top_k = if request.top_k == 0 {
            DEFAULT_TOP_K
        } else {
            request.top_k
        };
        let active_filters = request.filters.as_ref().filter(|f| !f.is_empty());

        let (results, query) = match (&request.input, active_filters) {
            (Some(input), _) => {
                let descriptor = QueryDescriptor {
                    kind: input.kind().to_string(),
                    value: input.value().to_string(),
                };
                let results = self
                    .semantic_search(input, active_filters, &request.scope, top_k)
                    .await?;
                (results, descriptor)
            }
            (None, Some(filters)) => {
                let descriptor = QueryDescriptor {
                    kind: "metadata".to_string(),
                    value: String::new(),
                };
                let results = self
                    .metadata_search(filters, &request.scope, top_k)
                    .await?;
                (results, descriptor)
            }
            (None, None) => {
                return Err(ReferenceError::InvalidRequest(
                    "search needs a text query, an image, or classification filters".to_string(),
                ));
            }
        };

        let stats = SearchStats {
            total_results: results.len(),
            search_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Search ({}) returned {} results in {}ms",
            query.kind,
            stats.total_results,
            stats.search_time_ms
        );

        Ok(SearchOutcome {
            results,
            query,
            filters: request.filters,
            stats,
        })
    }

    /// Semantic (and hybrid) retrieval against the vector side of the
    /// repository, with the bounded public-fallback hop.
    async fn semantic_search(
        &self,
        input: &QueryInput,
        filters: Option<&ClassificationFilters>,
        scope: &SearchScope,
        top_k: usize,
    ) -> ReferenceResult<Vec<ScoredSlide>> {
        let query_vector = match input {
            QueryInput::Text(text) => self.embedder.embed_text(text).await?,
            QueryInput::ImageLocator(locator) => self.embedder.embed_image(locator).await?,
        };

        let has_filters = filters.map(|f| !f.is_empty()).unwrap_or(false);
        let fetch_k = if has_filters {
            top_k * HYBRID_OVERFETCH_FACTOR
        } else {
            top_k
        };

        let mut hits = Vec::new();
        for pass in scope_passes(scope) {
            let restricts = scope_restricts(scope, pass);
            let mut found = self
                .repository
                .query_by_vector(&query_vector, &restricts, fetch_k)
                .await?;
            apply_owner_post_filter(scope, pass, &mut found);

            if !found.is_empty() {
                hits = found;
                break;
            }
            if pass == ScopePass::Scoped && wants_public_fallback(scope) {
                tracing::debug!("Scoped pass empty; retrying once with public visibility");
                continue;
            }
            break;
        }

        if let Some(filters) = filters {
            hits.retain(|hit| filters.matches(hit.record.classification.as_ref()));
        }
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Metadata-only retrieval: scalar predicates server-side, array
    /// tags client-side, every match scored 1.0.
    async fn metadata_search(
        &self,
        filters: &ClassificationFilters,
        scope: &SearchScope,
        top_k: usize,
    ) -> ReferenceResult<Vec<ScoredSlide>> {
        let mut hits = Vec::new();
        for pass in scope_passes(scope) {
            let scope_filter = SlideFilter::from_restricts(&scope_restricts(scope, pass));
            let variants = expand_filter_variants(scope_filter, filters.scalar_predicates());

            let mut seen = HashSet::new();
            let mut records = Vec::new();
            for variant in variants {
                let page = self
                    .repository
                    .query_by_metadata(&variant, METADATA_PAGE_LIMIT)
                    .await?;
                for record in page {
                    if seen.insert(record.id.clone()) {
                        records.push(record);
                    }
                }
            }

            records.retain(|record| filters.matches(record.classification.as_ref()));

            let mut found: Vec<ScoredSlide> = records
                .into_iter()
                .map(|record| ScoredSlide { record, score: 1.0 })
                .collect();
            apply_owner_post_filter(scope, pass, &mut found);

            if !found.is_empty() {
                hits = found;
                break;
            }
            if pass == ScopePass::Scoped && wants_public_fallback(scope) {
                continue;
            }
            break;
        }

        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Whether this scope is eligible for the single public-fallback retry.
fn wants_public_fallback(scope: &SearchScope) -> bool {
    scope.fallback_to_public && scope.owner_id.is_some() && scope.visibility.is_none()
}

fn scope_passes(scope: &SearchScope) -> Vec<ScopePass> {
    if wants_public_fallback(scope) {
        vec![ScopePass::Scoped, ScopePass::PublicFallback]
    } else {
        vec![ScopePass::Scoped]
    }
}

/// The ownership/visibility algebra.
///
/// Explicit visibility is the sole scope filter; an owner without
/// fallback means (owner AND private); an owner with fallback means
/// (public OR owner-private), which the ANN provider cannot express in
/// one query — so that pass runs unrestricted on those namespaces and
/// relies on the owner post-filter. No owner and no visibility means
/// public only.
fn scope_restricts(scope: &SearchScope, pass: ScopePass) -> Vec<Restrict> {
    let mut restricts = Vec::new();
    if let Some(deck_id) = &scope.deck_id {
        restricts.push(Restrict::new(NS_DECK_ID, deck_id.clone()));
    }

    match pass {
        ScopePass::PublicFallback => {
            restricts.push(Restrict::new(NS_VISIBILITY, Visibility::Public.as_str()));
        }
        ScopePass::Scoped => {
            if let Some(visibility) = scope.visibility {
                restricts.push(Restrict::new(NS_VISIBILITY, visibility.as_str()));
            } else if let Some(owner_id) = &scope.owner_id {
                if !scope.fallback_to_public {
                    restricts.push(Restrict::new(NS_OWNER_ID, owner_id.clone()));
                    restricts.push(Restrict::new(NS_VISIBILITY, Visibility::Private.as_str()));
                }
                // With fallback enabled the disjunction is resolved by
                // the post-filter instead of a restrict.
            } else {
                restricts.push(Restrict::new(NS_VISIBILITY, Visibility::Public.as_str()));
            }
        }
    }

    restricts
}

/// Drop non-public hits that belong to someone else. Only the scoped,
/// fallback-enabled pass retrieves with the visibility namespaces open.
fn apply_owner_post_filter(scope: &SearchScope, pass: ScopePass, hits: &mut Vec<ScoredSlide>) {
    if pass != ScopePass::Scoped || !wants_public_fallback(scope) {
        return;
    }
    let owner_id = scope.owner_id.as_deref().unwrap_or_default();
    hits.retain(|hit| {
        hit.record.visibility == Visibility::Public || hit.record.owner_id == owner_id
    });
}

/// Expand scalar predicates onto the scope filter, splitting any `in`
/// clause wider than the provider limit into multiple queries whose
/// results the caller unions.
fn expand_filter_variants(
    base: SlideFilter,
    predicates: Vec<(String, Vec<serde_json::Value>)>,
) -> Vec<SlideFilter> {
    let mut variants = vec![base];
    for (field, values) in predicates {
        if values.len() == 1 {
            for variant in &mut variants {
                variant.equals.push((field.clone(), values[0].clone()));
            }
        } else {
            let mut expanded = Vec::new();
            for chunk in values.chunks(IN_CLAUSE_LIMIT) {
                for variant in &variants {
                    let mut next = variant.clone();
                    next.any_of.push((field.clone(), chunk.to_vec()));
                    expanded.push(next);
                }
            }
            variants = expanded;
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_scope(fallback: bool) -> SearchScope {
        SearchScope {
            owner_id: Some("u1".to_string()),
            deck_id: None,
            visibility: None,
            fallback_to_public: fallback,
        }
    }

    fn restrict_value<'a>(restricts: &'a [Restrict], namespace: &str) -> Option<&'a str> {
        restricts
            .iter()
            .find(|r| r.namespace == namespace)
            .and_then(|r| r.allow_list.first())
            .map(String::as_str)
    }

    #[test]
    fn test_explicit_visibility_is_sole_filter() {
        let scope = SearchScope {
            owner_id: Some("u1".to_string()),
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        let restricts = scope_restricts(&scope, ScopePass::Scoped);
        assert_eq!(restrict_value(&restricts, NS_VISIBILITY), Some("public"));
        assert_eq!(restrict_value(&restricts, NS_OWNER_ID), None);
    }

    #[test]
    fn test_owner_without_fallback_restricts_to_private() {
        let restricts = scope_restricts(&owner_scope(false), ScopePass::Scoped);
        assert_eq!(restrict_value(&restricts, NS_OWNER_ID), Some("u1"));
        assert_eq!(restrict_value(&restricts, NS_VISIBILITY), Some("private"));
    }

    #[test]
    fn test_owner_with_fallback_leaves_namespaces_open() {
        let restricts = scope_restricts(&owner_scope(true), ScopePass::Scoped);
        assert_eq!(restrict_value(&restricts, NS_OWNER_ID), None);
        assert_eq!(restrict_value(&restricts, NS_VISIBILITY), None);
    }

    #[test]
    fn test_anonymous_scope_defaults_to_public() {
        let restricts = scope_restricts(&SearchScope::default(), ScopePass::Scoped);
        assert_eq!(restrict_value(&restricts, NS_VISIBILITY), Some("public"));
    }

    #[test]
    fn test_deck_restrict_survives_fallback_pass() {
        let scope = SearchScope {
            deck_id: Some("d9".to_string()),
            ..owner_scope(true)
        };
        let restricts = scope_restricts(&scope, ScopePass::PublicFallback);
        assert_eq!(restrict_value(&restricts, NS_DECK_ID), Some("d9"));
        assert_eq!(restrict_value(&restricts, NS_VISIBILITY), Some("public"));
    }

    #[test]
    fn test_fallback_is_bounded_to_two_passes() {
        assert_eq!(scope_passes(&owner_scope(true)).len(), 2);
        assert_eq!(scope_passes(&owner_scope(false)).len(), 1);
        // Explicit visibility disables the fallback hop entirely.
        let scope = SearchScope {
            visibility: Some(Visibility::Private),
            ..owner_scope(true)
        };
        assert_eq!(scope_passes(&scope).len(), 1);
    }

    #[test]
    fn test_expand_filter_variants_within_limit() {
        let predicates = vec![(
            "classification.contentType".to_string(),
            vec![serde_json::json!("title"), serde_json::json!("proof")],
        )];
        let variants = expand_filter_variants(SlideFilter::default(), predicates);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].any_of[0].1.len(), 2);
    }

    #[test]
    fn test_expand_filter_variants_splits_oversized_in_clause() {
        let values: Vec<serde_json::Value> = (0..25).map(|i| serde_json::json!(i)).collect();
        let predicates = vec![("f".to_string(), values)];
        let variants = expand_filter_variants(SlideFilter::default(), predicates);
        assert_eq!(variants.len(), 3);
        let total: usize = variants.iter().map(|v| v.any_of[0].1.len()).sum();
        assert_eq!(total, 25);
        assert!(variants.iter().all(|v| v.any_of[0].1.len() <= IN_CLAUSE_LIMIT));
    }

    #[test]
    fn test_single_value_predicate_becomes_equality() {
        let predicates = vec![("f".to_string(), vec![serde_json::json!(true)])];
        let variants = expand_filter_variants(SlideFilter::default(), predicates);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].equals.len(), 1);
        assert!(variants[0].any_of.is_empty());
    }
}
