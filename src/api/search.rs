// Search endpoint: semantic, metadata-only, and hybrid retrieval

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::errors::AppError;
use crate::api::AppState;
use crate::reference::filters::ClassificationFilters;
use crate::reference::search::{QueryDescriptor, SearchRequest, SearchStats};
use crate::reference::types::{
    QueryInput, ScoredSlide, SearchScope, SlideClassification, Visibility,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSlidesRequest {
    /// Free-text query, embedded and matched semantically.
    pub query: Option<String>,
    /// URL of a reference image to match against instead of text.
    pub image_url: Option<String>,
    pub filters: Option<ClassificationFilters>,
    pub owner_id: Option<String>,
    pub deck_id: Option<String>,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub fallback_to_public: bool,
    #[serde(default)]
    pub top_k: usize,
}

/// One hit, without the raw embedding.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideHit {
    pub id: String,
    pub deck_id: String,
    pub deck_name: String,
    pub slide_index: usize,
    pub image_locator: String,
    pub owner_id: String,
    pub visibility: Visibility,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<SlideClassification>,
}

impl From<ScoredSlide> for SlideHit {
    fn from(hit: ScoredSlide) -> Self {
        let record = hit.record;
        Self {
            id: record.id,
            deck_id: record.deck_id,
            deck_name: record.deck_name,
            slide_index: record.slide_index,
            image_locator: record.image_locator,
            owner_id: record.owner_id,
            visibility: record.visibility,
            score: hit.score,
            classification: record.classification,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSlidesResponse {
    pub success: bool,
    pub results: Vec<SlideHit>,
    pub query: QueryDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<ClassificationFilters>,
    pub stats: SearchStats,
}

pub async fn search_slides_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchSlidesRequest>,
) -> Result<Json<SearchSlidesResponse>, AppError> {
    let input = match (request.query, request.image_url) {
        (Some(text), None) => Some(QueryInput::Text(text)),
        (None, Some(url)) => Some(QueryInput::ImageLocator(url)),
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(AppError::invalid_input(
                "provide either a text query or an image URL, not both",
            ));
        }
    };

    let outcome = state
        .coordinator
        .search(SearchRequest {
            input,
            filters: request.filters,
            scope: SearchScope {
                owner_id: request.owner_id,
                deck_id: request.deck_id,
                visibility: request.visibility,
                fallback_to_public: request.fallback_to_public,
            },
            top_k: request.top_k,
        })
        .await?;

    Ok(Json(SearchSlidesResponse {
        success: true,
        results: outcome.results.into_iter().map(SlideHit::from).collect(),
        query: outcome.query,
        filters: outcome.filters,
        stats: outcome.stats,
    }))
}
