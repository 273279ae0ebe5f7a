//! Qdrant REST client

use super::{PointRecord, ScoredPoint, ScrollCursor, ScrollPage, StoredPoint, VectorIndex};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Vector index backed by a Qdrant server
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

/// Qdrant wraps every response as `{"result": ..., "status": ..., "time": ...}`
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Deserialize)]
struct RawScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct RawScrollResult {
    points: Vec<RawStoredPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct RawStoredPoint {
    id: Value,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Serialize)]
struct ScrollRequest<'a> {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<&'a Value>,
    with_payload: bool,
    with_vector: bool,
}

impl QdrantIndex {
    /// Create a client for the configured endpoint
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| AppError::Configuration {
            message: format!("Invalid vector store url '{}': {}", config.url, e),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Build an endpoint URL, percent-encoding the collection name
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration {
                message: format!("Vector store url cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        collection: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.request(method, url);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| AppError::StoreUnavailable {
            message: format!("Request failed: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body, collection));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| AppError::Internal {
            message: format!("Failed to parse vector store response: {}", e),
        })?;
        Ok(envelope.result)
    }
}

fn map_status(status: StatusCode, body: String, collection: Option<&str>) -> AppError {
    match (status, collection) {
        (StatusCode::NOT_FOUND, Some(name)) => AppError::CollectionNotFound {
            name: name.to_string(),
        },
        (s, _) if s.is_server_error() => AppError::StoreUnavailable {
            message: format!("{}: {}", s, body),
        },
        (s, _) => AppError::StoreRejected {
            status: s.as_u16(),
            message: body,
        },
    }
}

/// Point ids are either unsigned integers or UUID strings
fn id_to_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn id_to_json(id: &str) -> Value {
    match id.parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(id.to_string()),
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let url = self.endpoint(&["collections", collection, "exists"])?;
        let result: ExistsResult = self.call(Method::GET, url, None, None).await?;
        Ok(result.exists)
    }

    #[instrument(skip(self))]
    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let url = self.endpoint(&["collections", collection])?;
        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        let _: Value = self.call(Method::PUT, url, Some(body), None).await?;
        debug!("Collection created");
        Ok(())
    }

    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let mut url = self.endpoint(&["collections", collection, "points"])?;
        url.query_pairs_mut().append_pair("wait", "true");

        let points: Vec<Value> = points
            .into_iter()
            .map(|p| json!({ "id": id_to_json(&p.id), "vector": p.vector, "payload": p.payload }))
            .collect();

        let _: Value = self
            .call(Method::PUT, url, Some(json!({ "points": points })), Some(collection))
            .await?;
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let url = self.endpoint(&["collections", collection, "points", "search"])?;
        let body = json!({ "vector": vector, "limit": k, "with_payload": true });

        let raw: Vec<RawScoredPoint> = self
            .call(Method::POST, url, Some(body), Some(collection))
            .await?;

        Ok(raw
            .into_iter()
            .map(|p| ScoredPoint {
                id: id_to_string(p.id),
                score: p.score,
                payload: p.payload.unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        cursor: Option<ScrollCursor>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let url = self.endpoint(&["collections", collection, "points", "scroll"])?;
        let request = ScrollRequest {
            limit,
            offset: cursor.as_ref().map(|c| &c.0),
            with_payload: true,
            with_vector: false,
        };
        let body = serde_json::to_value(&request)?;

        let raw: RawScrollResult = self
            .call(Method::POST, url, Some(body), Some(collection))
            .await?;

        Ok(ScrollPage {
            points: raw
                .points
                .into_iter()
                .map(|p| StoredPoint {
                    id: id_to_string(p.id),
                    payload: p.payload.unwrap_or(Value::Null),
                })
                .collect(),
            next: raw
                .next_page_offset
                .filter(|v| !v.is_null())
                .map(ScrollCursor),
        })
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let url = self.endpoint(&["collections", collection])?;
        match self.call::<bool>(Method::DELETE, url, None, Some(collection)).await {
            Ok(deleted) => Ok(deleted),
            Err(AppError::CollectionNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["collections"])?;
        let result: CollectionsResult = self.call(Method::GET, url, None, None).await?;
        Ok(result.collections.into_iter().map(|c| c.name).collect())
    }
}
