// REST adapter for the external ANN vector index
//
// Upsert/query/delete with label-based restricts. Upserts and removes
// are chunked to the provider's per-request datapoint cap and the
// chunks are issued concurrently; each chunk targets a disjoint id set
// so no ordering is required.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Neighbor, Restrict, VectorDatapoint, VectorIndex, VECTOR_BATCH_LIMIT};
use crate::reference::{ReferenceError, ReferenceResult};

#[derive(Debug, Clone)]
pub struct AnnIndexClient {
    client: Client,
    base_url: String,
    index_id: String,
    deployed_index_id: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest {
    datapoints: Vec<WireDatapoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDatapoint {
    datapoint_id: String,
    feature_vector: Vec<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    restricts: Vec<WireRestrict>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRestrict {
    namespace: String,
    allow_list: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsRequest {
    deployed_index_id: String,
    queries: Vec<NeighborQuery>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NeighborQuery {
    datapoint: QueryDatapoint,
    neighbor_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryDatapoint {
    feature_vector: Vec<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    restricts: Vec<WireRestrict>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveRequest {
    datapoint_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NeighborList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborList {
    #[serde(default)]
    neighbors: Vec<WireNeighbor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNeighbor {
    datapoint: NeighborDatapoint,
    distance: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborDatapoint {
    datapoint_id: String,
}

impl AnnIndexClient {
    /// Capability check: all three settings must be present for the ANN
    /// path to exist. Anything less means the caller falls back to the
    /// local brute-force repository.
    pub fn from_config(
        client: Client,
        base_url: Option<String>,
        index_id: Option<String>,
        deployed_index_id: Option<String>,
        api_key: Option<String>,
    ) -> Option<Self> {
        match (base_url, index_id, deployed_index_id) {
            (Some(base_url), Some(index_id), Some(deployed_index_id)) => Some(Self {
                client,
                base_url,
                index_id,
                deployed_index_id,
                api_key,
            }),
            _ => None,
        }
    }

    async fn post(&self, url: &str, body: &impl Serialize) -> ReferenceResult<reqwest::Response> {
        let mut req = self.client.post(url).json(body);
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

        Ok(response)
    }

    fn wire_restricts(restricts: &[Restrict]) -> Vec<WireRestrict> {
        restricts
            .iter()
            .map(|r| WireRestrict {
                namespace: r.namespace.clone(),
                allow_list: r.allow_list.clone(),
            })
            .collect()
    }

    /// Split an upsert into provider-sized request bodies.
    fn upsert_requests(points: &[VectorDatapoint]) -> Vec<UpsertRequest> {
        points
            .chunks(VECTOR_BATCH_LIMIT)
            .map(|chunk| UpsertRequest {
                datapoints: chunk
                    .iter()
                    .map(|p| WireDatapoint {
                        datapoint_id: p.id.clone(),
                        feature_vector: p.embedding.clone(),
                        restricts: Self::wire_restricts(&p.restricts),
                    })
                    .collect(),
            })
            .collect()
    }

    fn remove_requests(ids: &[String]) -> Vec<RemoveRequest> {
        ids.chunks(VECTOR_BATCH_LIMIT)
            .map(|chunk| RemoveRequest {
                datapoint_ids: chunk.to_vec(),
            })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for AnnIndexClient {
    async fn upsert(&self, points: &[VectorDatapoint]) -> ReferenceResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = format!("{}/indexes/{}:upsertDatapoints", self.base_url, self.index_id);

        let requests = Self::upsert_requests(points).into_iter().map(|body| {
            let url = url.clone();
            async move {
                self.post(&url, &body).await?;
                Ok::<_, ReferenceError>(())
            }
        });

        try_join_all(requests).await?;
        tracing::debug!("Upserted {} datapoints to vector index", points.len());
        Ok(())
    }

    async fn find_neighbors(
        &self,
        query: &[f32],
        restricts: &[Restrict],
        top_k: usize,
    ) -> ReferenceResult<Vec<Neighbor>> {
        let url = format!(
            "{}/indexEndpoints/{}:findNeighbors",
            self.base_url, self.index_id
        );
        let body = FindNeighborsRequest {
            deployed_index_id: self.deployed_index_id.clone(),
            queries: vec![NeighborQuery {
                datapoint: QueryDatapoint {
                    feature_vector: query.to_vec(),
                    restricts: Self::wire_restricts(restricts),
                },
                neighbor_count: top_k,
            }],
        };

        let response = self.post(&url, &body).await?;
        let parsed: FindNeighborsResponse = response
            .json()
            .await
            .map_err(|e| ReferenceError::Provider(e.to_string()))?;

        Ok(parsed
            .nearest_neighbors
            .into_iter()
            .next()
            .map(|list| {
                list.neighbors
                    .into_iter()
                    .map(|n| Neighbor {
                        id: n.datapoint.datapoint_id,
                        distance: n.distance,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove(&self, ids: &[String]) -> ReferenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/indexes/{}:removeDatapoints", self.base_url, self.index_id);

        let requests = Self::remove_requests(ids).into_iter().map(|body| {
            let url = url.clone();
            async move {
                self.post(&url, &body).await?;
                Ok::<_, ReferenceError>(())
            }
        });

        try_join_all(requests).await?;
        Ok(())
    }
}
