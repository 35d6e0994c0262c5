// Environment-driven configuration

use std::str::FromStr;

use crate::reference::types::DistanceMetric;
use crate::reference::{ReferenceError, ReferenceResult};

pub const DEFAULT_PORT: u16 = 8890;
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1408;

/// Everything the server needs from the environment. The vector-index
/// settings are optional as a set: leaving any of them out puts the
/// engine into local brute-force search.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    pub embedding_endpoint: String,
    pub embedding_model: String,
    pub embedding_api_key: String,
    pub embedding_dimension: usize,

    pub classifier_endpoint: Option<String>,
    pub classifier_model: String,
    pub classifier_api_key: Option<String>,

    pub metadata_store_url: String,
    pub metadata_store_api_key: String,

    pub vector_endpoint: Option<String>,
    pub vector_index_id: Option<String>,
    pub vector_deployed_index_id: Option<String>,
    pub vector_api_key: String,
    pub distance_metric: DistanceMetric,
}

impl Config {
    pub fn from_env() -> ReferenceResult<Self> {
        let port = match std::env::var("SLIDEREF_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                ReferenceError::ConfigurationMissing(format!("SLIDEREF_PORT is not a port: {}", raw))
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let embedding_dimension = match std::env::var("SLIDEREF_EMBEDDING_DIMENSION") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                ReferenceError::ConfigurationMissing(format!(
                    "SLIDEREF_EMBEDDING_DIMENSION is not a number: {}",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_EMBEDDING_DIMENSION,
        };

        let distance_metric = match std::env::var("SLIDEREF_DISTANCE_METRIC") {
            Ok(raw) => DistanceMetric::from_str(&raw).map_err(ReferenceError::ConfigurationMissing)?,
            Err(_) => DistanceMetric::Cosine,
        };

        Ok(Self {
            bind_address: env_or("SLIDEREF_BIND_ADDRESS", "127.0.0.1"),
            port,
            embedding_endpoint: require_env("SLIDEREF_EMBEDDING_ENDPOINT")?,
            embedding_model: env_or("SLIDEREF_EMBEDDING_MODEL", "multimodal-embedding-001"),
            embedding_api_key: require_env("SLIDEREF_EMBEDDING_API_KEY")?,
            embedding_dimension,
            classifier_endpoint: std::env::var("SLIDEREF_CLASSIFIER_ENDPOINT").ok(),
            classifier_model: env_or("SLIDEREF_CLASSIFIER_MODEL", "vision-classifier-001"),
            classifier_api_key: std::env::var("SLIDEREF_CLASSIFIER_API_KEY").ok(),
            metadata_store_url: require_env("SLIDEREF_METADATA_STORE_URL")?,
            metadata_store_api_key: require_env("SLIDEREF_METADATA_STORE_API_KEY")?,
            vector_endpoint: std::env::var("SLIDEREF_VECTOR_ENDPOINT").ok(),
            vector_index_id: std::env::var("SLIDEREF_VECTOR_INDEX_ID").ok(),
            vector_deployed_index_id: std::env::var("SLIDEREF_VECTOR_DEPLOYED_INDEX_ID").ok(),
            vector_api_key: std::env::var("SLIDEREF_VECTOR_API_KEY").unwrap_or_default(),
            distance_metric,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> ReferenceResult<String> {
    std::env::var(key)
        .map_err(|_| ReferenceError::ConfigurationMissing(format!("{} is not set", key)))
}
