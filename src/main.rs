use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use slideref::api::{self, AppState};
use slideref::config::Config;
use slideref::reference::classifier::{SlideClassifier, VisionClassifierClient};
use slideref::reference::embedding::{EmbeddingClientConfig, MultimodalEmbeddingClient};
use slideref::reference::pipeline::IndexingPipeline;
use slideref::reference::repository::build_repository;
use slideref::reference::search::RetrievalCoordinator;
use slideref::reference::store::{AnnIndexClient, DocumentStoreClient, MetadataStore, VectorIndex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let http = reqwest::Client::new();

    let embedder = Arc::new(MultimodalEmbeddingClient::new(
        http.clone(),
        config.embedding_endpoint.clone(),
        Some(config.embedding_api_key.clone()),
        EmbeddingClientConfig {
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
            ..EmbeddingClientConfig::default()
        },
    ));

    let classifier: Option<Arc<dyn SlideClassifier>> = match &config.classifier_endpoint {
        Some(endpoint) => Some(Arc::new(VisionClassifierClient::new(
            http.clone(),
            endpoint.clone(),
            config.classifier_model.clone(),
            config.classifier_api_key.clone(),
        ))),
        None => {
            tracing::info!("No classifier endpoint configured; slides will be indexed unclassified");
            None
        }
    };

    let metadata: Arc<dyn MetadataStore> = Arc::new(DocumentStoreClient::new(
        http.clone(),
        config.metadata_store_url.clone(),
        Some(config.metadata_store_api_key.clone()),
    ));

    let vector: Option<Arc<dyn VectorIndex>> = AnnIndexClient::from_config(
        http,
        config.vector_endpoint.clone(),
        config.vector_index_id.clone(),
        config.vector_deployed_index_id.clone(),
        (!config.vector_api_key.is_empty()).then(|| config.vector_api_key.clone()),
    )
    .map(|client| Arc::new(client) as Arc<dyn VectorIndex>);

    let repository = build_repository(metadata, vector, config.distance_metric);

    let state = AppState {
        pipeline: Arc::new(IndexingPipeline::new(
            embedder.clone(),
            classifier,
            repository.clone(),
        )),
        coordinator: Arc::new(RetrievalCoordinator::new(embedder, repository)),
    };

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Slide reference service listening on {}", addr);
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}
