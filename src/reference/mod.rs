// Slide reference engine
// Core types, traits and errors for indexing and retrieval

pub mod classifier;
pub mod embedding;
pub mod filters;
pub mod pipeline;
pub mod repository;
pub mod search;
pub mod store;
pub mod types;

pub use classifier::SlideClassifier;
pub use embedding::Embedder;
pub use pipeline::IndexingPipeline;
pub use repository::{build_repository, SlideRepository};
pub use search::RetrievalCoordinator;
pub use types::*;

/// Errors surfaced by the reference engine.
///
/// Degraded-but-successful paths (classification failure during
/// indexing, vector-side delete failure after the metadata delete
/// succeeded) are log events, never error values.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// Transport or auth failure from an external provider call.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// An embedding response did not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Required configuration is absent. Consumed by the repository
    /// capability check; never surfaced to API callers.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// The metadata store rejected or failed a request.
    #[error("metadata store error: {0}")]
    MetadataStore(String),

    /// The caller sent a request the engine cannot act on.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type ReferenceResult<T> = Result<T, ReferenceError>;
