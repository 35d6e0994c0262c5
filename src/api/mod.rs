// HTTP surface of the slide reference service

pub mod errors;
pub mod indexing;
pub mod search;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::reference::pipeline::IndexingPipeline;
use crate::reference::search::RetrievalCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IndexingPipeline>,
    pub coordinator: Arc<RetrievalCoordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/reference/search", post(search::search_slides_handler))
        .route("/api/reference/decks", post(indexing::index_deck_handler))
        .route("/api/reference/slides", post(indexing::index_slide_handler))
        .route(
            "/api/reference/slides/{slide_id}",
            delete(indexing::delete_slide_handler),
        )
        .route(
            "/api/reference/decks/{deck_id}",
            delete(indexing::delete_deck_handler),
        )
        .route(
            "/api/reference/owners/{owner_id}/slides",
            delete(indexing::delete_owner_slides_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
