// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding client with an in-memory text cache.
//!
//! The cache makes the retriever's dual-query cheap: the most recent
//! assistant message is embedded once and re-used until it changes. The
//! cache is process-local; after a restart the first use recomputes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use mnemos_core::{Embedder, Error};

use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// HTTP client for an OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, Error> {
        if dimension == 0 {
            return Err(Error::BadArgument(
                "embedding dimension must be positive".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| Error::BadArgument(format!("invalid API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::UpstreamFailure {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(EmbeddingClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            timeout,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(text).cloned()
    }

    fn remember(&self, text: &str, vec: &[f32]) {
        if let Ok(mut cache) = self.cache.lock() {
            // Bound memory: drop everything on overflow rather than
            // tracking recency; re-embedding is cheap at this rate.
            if cache.len() >= 512 {
                cache.clear();
            }
            cache.insert(text.to_string(), vec.to_vec());
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        if let Some(hit) = self.cached(text) {
            debug!(len = text.len(), "embedding cache hit");
            return Ok(hit);
        }

        let body = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    Error::UpstreamFailure {
                        message: format!("embedding request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "embedding API returned {status}: {text}"
            )));
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| Error::UpstreamFailure {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::upstream("embedding API returned no data"))?;

        if embedding.len() != self.dimension {
            return Err(Error::upstream(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        self.remember(text, &embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedding_body(vec: &[f32]) -> serde_json::Value {
        serde_json::json!({"data": [{"embedding": vec}]})
    }

    #[tokio::test]
    async fn embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"input": "hello"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embedding_body(&[0.1, 0.2, 0.3, 0.4])),
            )
            .mount(&server)
            .await;

        let client =
            EmbeddingClient::new(&server.uri(), None, "embed-model", 4, Duration::from_secs(5))
                .unwrap();
        let vec = client.embed("hello").await.unwrap();
        assert_eq!(vec.len(), 4);
        assert!((vec[0] - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn embed_caches_repeat_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embedding_body(&[1.0, 0.0, 0.0, 0.0])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client =
            EmbeddingClient::new(&server.uri(), None, "embed-model", 4, Duration::from_secs(5))
                .unwrap();
        let first = client.embed("same text").await.unwrap();
        let second = client.embed("same text").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[0.1, 0.2])))
            .mount(&server)
            .await;

        let client =
            EmbeddingClient::new(&server.uri(), None, "embed-model", 4, Duration::from_secs(5))
                .unwrap();
        let err = client.embed("short").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }

    #[tokio::test]
    async fn upstream_error_status_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client =
            EmbeddingClient::new(&server.uri(), None, "embed-model", 4, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.embed("x").await.unwrap_err().kind(), "upstream_failure");
    }
}
