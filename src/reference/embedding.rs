// Embedding generator: wraps the external multimodal embedding endpoint

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use crate::reference::{ReferenceError, ReferenceResult};

/// Images per embedding chunk. Multimodal models are slow; keep this small.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 8;
/// Pause between chunks. Simple throttling, not adaptive backoff.
pub const DEFAULT_INTER_CHUNK_PAUSE_MS: u64 = 200;
/// Provider token limit for text inputs, expressed as a word budget.
pub const DEFAULT_TEXT_WORD_BUDGET: usize = 32;

/// Turns an image or text into a fixed-length vector. Every response is
/// validated against the configured dimension before it leaves this
/// module.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The fixed embedding dimension `D` of this deployment.
    fn dimension(&self) -> usize;

    async fn embed_image(&self, locator: &str) -> ReferenceResult<Vec<f32>>;

    async fn embed_text(&self, text: &str) -> ReferenceResult<Vec<f32>>;

    /// Embed many images in fixed-size chunks with a short pause between
    /// chunks. A failure anywhere fails the whole call; there is no
    /// partial-success contract.
    async fn embed_image_batch(&self, locators: &[String]) -> ReferenceResult<Vec<Vec<f32>>> {
        embed_in_chunks(
            self,
            locators,
            DEFAULT_EMBED_BATCH_SIZE,
            DEFAULT_INTER_CHUNK_PAUSE_MS,
        )
        .await
    }
}

/// Chunked fan-out shared by every embedder implementation.
pub async fn embed_in_chunks<E: Embedder + ?Sized>(
    embedder: &E,
    locators: &[String],
    batch_size: usize,
    pause_ms: u64,
) -> ReferenceResult<Vec<Vec<f32>>> {
    if locators.is_empty() {
        return Ok(Vec::new());
    }

    let total = locators.len();
    let mut all_embeddings = Vec::with_capacity(total);

    for (chunk_idx, chunk) in locators.chunks(batch_size).enumerate() {
        if chunk_idx > 0 {
            sleep(Duration::from_millis(pause_ms)).await;
        }

        let futures = chunk.iter().map(|locator| embedder.embed_image(locator));
        let embeddings = try_join_all(futures).await?;
        all_embeddings.extend(embeddings);

        tracing::debug!(
            "Embedded chunk {}: {}/{} images",
            chunk_idx + 1,
            all_embeddings.len(),
            total
        );
    }

    Ok(all_embeddings)
}

/// Truncate text to a word budget before submission.
pub fn truncate_to_word_budget(text: &str, budget: usize) -> String {
    let mut words = text.split_whitespace();
    let truncated: Vec<&str> = words.by_ref().take(budget).collect();
    truncated.join(" ")
}

/// Validate a returned vector against the deployment dimension.
pub fn check_dimension(vector: &[f32], expected: usize) -> ReferenceResult<()> {
    if vector.len() != expected {
        return Err(ReferenceError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub inter_chunk_pause_ms: u64,
    pub text_word_budget: usize,
}

impl Default for EmbeddingClientConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            dimension: 0,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            inter_chunk_pause_ms: DEFAULT_INTER_CHUNK_PAUSE_MS,
            text_word_budget: DEFAULT_TEXT_WORD_BUDGET,
        }
    }
}

/// Client for a `:predict`-style multimodal embedding endpoint.
#[derive(Debug, Clone)]
pub struct MultimodalEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    config: EmbeddingClientConfig,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PredictInstance {
    Image { image: ImageInput },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageInput {
    uri: String,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    image_embedding: Option<Vec<f32>>,
    #[serde(default)]
    text_embedding: Option<Vec<f32>>,
}

impl MultimodalEmbeddingClient {
    pub fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        config: EmbeddingClientConfig,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            config,
        }
    }

    async fn predict(&self, instance: PredictInstance) -> ReferenceResult<Prediction> {
        let url = format!("{}/v1/models/{}:predict", self.base_url, self.config.model);
        let body = PredictRequest {
            instances: vec![instance],
            parameters: PredictParameters {
                dimension: self.config.dimension,
            },
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| ReferenceError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReferenceError::Provider(format!("HTTP {}: {}", status, text)));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ReferenceError::Provider(e.to_string()))?;

        parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| ReferenceError::Provider("embedding endpoint returned no predictions".to_string()))
    }
}

#[async_trait]
impl Embedder for MultimodalEmbeddingClient {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed_image(&self, locator: &str) -> ReferenceResult<Vec<f32>> {
        let prediction = self
            .predict(PredictInstance::Image {
                image: ImageInput {
                    uri: locator.to_string(),
                },
            })
            .await?;

        let vector = prediction
            .image_embedding
            .ok_or_else(|| ReferenceError::Provider("response carried no image embedding".to_string()))?;
        check_dimension(&vector, self.config.dimension)?;
        Ok(vector)
    }

    async fn embed_text(&self, text: &str) -> ReferenceResult<Vec<f32>> {
        let truncated = truncate_to_word_budget(text, self.config.text_word_budget);
        let prediction = self.predict(PredictInstance::Text { text: truncated }).await?;

        let vector = prediction
            .text_embedding
            .ok_or_else(|| ReferenceError::Provider("response carried no text embedding".to_string()))?;
        check_dimension(&vector, self.config.dimension)?;
        Ok(vector)
    }

    async fn embed_image_batch(&self, locators: &[String]) -> ReferenceResult<Vec<Vec<f32>>> {
        embed_in_chunks(
            self,
            locators,
            self.config.batch_size,
            self.config.inter_chunk_pause_ms,
        )
        .await
    }
}
