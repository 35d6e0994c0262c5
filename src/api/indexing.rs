// Indexing endpoints: deck/slide ingestion and the delete paths

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::errors::AppError;
use crate::api::AppState;
use crate::reference::types::{IndexDeckOutcome, SlideSource, Visibility};

fn default_visibility() -> Visibility {
    Visibility::Private
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDeckRequest {
    pub deck_name: String,
    pub slides: Vec<SlideSource>,
    pub user_id: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSlideRequest {
    pub deck_name: String,
    pub slide: SlideSource,
    pub user_id: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub success: bool,
    pub deck_id: String,
    pub deck_name: String,
    pub slides_indexed: usize,
}

impl From<IndexDeckOutcome> for IndexResponse {
    fn from(outcome: IndexDeckOutcome) -> Self {
        Self {
            success: true,
            deck_id: outcome.deck_id,
            deck_name: outcome.deck_name,
            slides_indexed: outcome.slides_indexed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub success: bool,
    pub deleted: usize,
}

pub async fn index_deck_handler(
    State(state): State<AppState>,
    Json(request): Json<IndexDeckRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if request.deck_name.trim().is_empty() {
        return Err(AppError::invalid_input("deckName must not be empty"));
    }
    if request.user_id.trim().is_empty() {
        return Err(AppError::invalid_input("userId must not be empty"));
    }

    let outcome = state
        .pipeline
        .index_deck(
            &request.deck_name,
            &request.slides,
            &request.user_id,
            request.visibility,
        )
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn index_slide_handler(
    State(state): State<AppState>,
    Json(request): Json<IndexSlideRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::invalid_input("userId must not be empty"));
    }

    let outcome = state
        .pipeline
        .index_slide(
            &request.deck_name,
            request.slide,
            &request.user_id,
            request.visibility,
        )
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn delete_slide_handler(
    State(state): State<AppState>,
    Path(slide_id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    state.pipeline.delete_slide(&slide_id).await?;
    Ok(Json(DeleteOutcome {
        success: true,
        deleted: 1,
    }))
}

pub async fn delete_deck_handler(
    State(state): State<AppState>,
    Path(deck_id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let deleted = state.pipeline.delete_deck(&deck_id).await?;
    Ok(Json(DeleteOutcome {
        success: true,
        deleted,
    }))
}

pub async fn delete_owner_slides_handler(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let deleted = state.pipeline.delete_user_slides(&owner_id).await?;
    Ok(Json(DeleteOutcome {
        success: true,
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_request_accepts_wire_field_names() {
        let parsed: IndexDeckRequest = serde_json::from_str(
            r#"{
                "deckName": "Q3 review",
                "userId": "u1",
                "visibility": "public",
                "slides": [{"imageUrl": "https://cdn/1.png", "name": "intro"}]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.visibility, Visibility::Public);
        assert_eq!(parsed.slides[0].image_locator, "https://cdn/1.png");
    }

    #[test]
    fn test_visibility_defaults_to_private() {
        let parsed: IndexDeckRequest = serde_json::from_str(
            r#"{"deckName": "d", "userId": "u1", "slides": []}"#,
        )
        .unwrap();
        assert_eq!(parsed.visibility, Visibility::Private);
    }

    #[test]
    fn test_responses_carry_success_envelope() {
        let index = IndexResponse::from(IndexDeckOutcome {
            deck_id: "d1".to_string(),
            deck_name: "Deck".to_string(),
            slides_indexed: 3,
        });
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["slidesIndexed"], 3);

        let delete = serde_json::to_value(DeleteOutcome {
            success: true,
            deleted: 2,
        })
        .unwrap();
        assert_eq!(delete["success"], true);
        assert_eq!(delete["deleted"], 2);
    }
}
