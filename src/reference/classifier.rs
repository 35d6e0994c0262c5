// Slide classifier: wraps the external vision model, best-effort only

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::reference::types::SlideClassification;
use crate::reference::{ReferenceError, ReferenceResult};

const CLASSIFY_PROMPT: &str = r#"Analyze this presentation slide image and respond with a single JSON object, no prose, with these fields:
contentType (one of: title, agenda, problem, solution, features, proof, pricing, roadmap, team, summary, call_to_action, other),
layout (one of: full_bleed, title_only, two_column, grid, timeline, comparison, bullet_list, chart_focus, image_focus, other),
visualStyle (one of: minimal, data_heavy, photographic, illustrated, corporate, bold, other),
persona (one of: executive, technical, sales, marketing, general),
salesStage (one of: prospecting, discovery, evaluation, proposal, closing, retention),
visualElements (array of short tags such as "charts", "table", "screenshot", "icons", "photo"),
contentHints (object of booleans: hasMetrics, hasQuote, hasLogo, hasProductUi, hasPeople, hasProcess, hasBullets, hasCallToAction),
confidence (0..1),
dominantColors (array of hex strings),
extractedTitle (string or null),
keywords (array of strings or null)."#;

/// Turns a slide image into structured tags. Callers treat every
/// failure as non-fatal: a slide that cannot be classified is indexed
/// without classification.
#[async_trait]
pub trait SlideClassifier: Send + Sync {
    async fn classify(&self, locator: &str) -> ReferenceResult<SlideClassification>;
}

/// Client for a `generateContent`-style vision endpoint.
#[derive(Debug, Clone)]
pub struct VisionClassifierClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

impl VisionClassifierClient {
    pub fn new(client: Client, base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            model,
            api_key,
        }
    }

    /// Models occasionally wrap JSON output in a markdown fence.
    fn strip_code_fence(text: &str) -> &str {
        let trimmed = text.trim();
        trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|s| s.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed)
    }
}

#[async_trait]
impl SlideClassifier for VisionClassifierClient {
    async fn classify(&self, locator: &str) -> ReferenceResult<SlideClassification> {
        let url = format!(
            "{}/v1/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: "image/png".to_string(),
                            file_uri: locator.to_string(),
                        },
                    },
                    Part::Text {
                        text: CLASSIFY_PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.0,
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

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ReferenceError::Provider(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ReferenceError::Provider("vision model returned no candidates".to_string()))?;

        serde_json::from_str(Self::strip_code_fence(&text))
            .map_err(|e| ReferenceError::Provider(format!("unparseable classification: {}", e)))
    }
}
