// Data model for the slide reference engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deck-level visibility, denormalized onto every slide at write time
/// so both stores can filter per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distance metric of the deployed ANN index. Scores returned to
/// callers are always "higher is better" regardless of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    DotProduct,
}

impl DistanceMetric {
    /// Convert a provider distance into a similarity score.
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => (1.0 - distance).clamp(0.0, 1.0),
            DistanceMetric::DotProduct => distance,
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot_product" => Ok(DistanceMetric::DotProduct),
            other => Err(format!("unknown distance metric: {}", other)),
        }
    }
}

/// One indexed slide. `id` is the join key between the metadata store
/// and the vector index; the embedding length is always exactly the
/// configured dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRecord {
    pub id: String,
    pub deck_id: String,
    pub deck_name: String,
    pub slide_index: usize,
    pub image_locator: String,
    pub owner_id: String,
    pub visibility: Visibility,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<SlideClassification>,
}

/// Deck record kept alongside its slides in the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRecord {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub visibility: Visibility,
    pub slide_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Structured tags produced by the vision classification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideClassification {
    pub content_type: ContentType,
    pub layout: SlideLayout,
    pub visual_style: VisualStyle,
    pub persona: Persona,
    pub sales_stage: SalesStage,
    #[serde(default)]
    pub visual_elements: Vec<String>,
    #[serde(default)]
    pub content_hints: ContentHints,
    pub confidence: f32,
    #[serde(default)]
    pub dominant_colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Title,
    Agenda,
    Problem,
    Solution,
    Features,
    Proof,
    Pricing,
    Roadmap,
    Team,
    Summary,
    CallToAction,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayout {
    FullBleed,
    TitleOnly,
    TwoColumn,
    Grid,
    Timeline,
    Comparison,
    BulletList,
    ChartFocus,
    ImageFocus,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualStyle {
    Minimal,
    DataHeavy,
    Photographic,
    Illustrated,
    Corporate,
    Bold,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Executive,
    Technical,
    Sales,
    Marketing,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesStage {
    Prospecting,
    Discovery,
    Evaluation,
    Proposal,
    Closing,
    Retention,
}

/// Boolean content hints extracted by the classifier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentHints {
    pub has_metrics: bool,
    pub has_quote: bool,
    pub has_logo: bool,
    pub has_product_ui: bool,
    pub has_people: bool,
    pub has_process: bool,
    pub has_bullets: bool,
    pub has_call_to_action: bool,
}

/// Ownership/visibility scope for a search, optionally pinned to one deck.
#[derive(Debug, Clone, Default)]
pub struct SearchScope {
    pub owner_id: Option<String>,
    pub deck_id: Option<String>,
    pub visibility: Option<Visibility>,
    pub fallback_to_public: bool,
}

/// What the caller wants matched semantically.
#[derive(Debug, Clone)]
pub enum QueryInput {
    Text(String),
    ImageLocator(String),
}

impl QueryInput {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryInput::Text(_) => "text",
            QueryInput::ImageLocator(_) => "image",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            QueryInput::Text(v) | QueryInput::ImageLocator(v) => v,
        }
    }
}

/// A slide with its retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredSlide {
    pub record: SlideRecord,
    pub score: f32,
}

/// One slide to index: an image locator plus an optional display name.
/// API callers send the locator as `imageUrl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSource {
    #[serde(alias = "imageUrl")]
    pub image_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Result of indexing a deck.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDeckOutcome {
    pub deck_id: String,
    pub deck_name: String,
    pub slides_indexed: usize,
}
