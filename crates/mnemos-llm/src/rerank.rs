// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional rerank client.
//!
//! Constructed disabled when any of base URL, key, or model is absent;
//! callers check `is_enabled()` and fall back to vector-score ordering.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use mnemos_core::{Error, Reranker};

use crate::types::{RerankRequest, RerankResponse};

/// HTTP client for a `/rerank` endpoint scoring (query, document) pairs.
pub struct RerankClient {
    inner: Option<Inner>,
    timeout: Duration,
}

struct Inner {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl RerankClient {
    /// Build from optional configuration; any missing piece disables
    /// the client.
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let (base_url, api_key, model) = match (base_url, api_key, model) {
            (Some(b), Some(k), Some(m)) => (b, k, m),
            _ => {
                debug!("reranker disabled (missing base URL, key, or model)");
                return Ok(RerankClient {
                    inner: None,
                    timeout,
                });
            }
        };

        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::BadArgument(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::UpstreamFailure {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(RerankClient {
            inner: Some(Inner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
            }),
            timeout,
        })
    }
}

#[async_trait]
impl Reranker for RerankClient {
    fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<usize>, Error> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => {
                // Disabled: identity ordering, truncated.
                return Ok((0..documents.len().min(top_n)).collect());
            }
        };
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: inner.model.clone(),
            query: query.to_string(),
            documents: documents.to_vec(),
            top_n,
        };
        let response = inner
            .client
            .post(format!("{}/rerank", inner.base_url))
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
                        message: format!("rerank request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "rerank API returned {status}: {text}"
            )));
        }

        let parsed: RerankResponse =
            response.json().await.map_err(|e| Error::UpstreamFailure {
                message: format!("failed to parse rerank response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut ranked: Vec<(usize, f64)> = parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .map(|r| (r.index, r.relevance_score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);
        Ok(ranked.into_iter().map(|(index, _)| index).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn disabled_client_returns_identity_order() {
        let client = RerankClient::new(None, None, None, Duration::from_secs(5)).unwrap();
        assert!(!client.is_enabled());
        let order = client
            .rerank("q", &docs(&["a", "b", "c"]), 2)
            .await
            .unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[tokio::test]
    async fn enabled_client_orders_by_score() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "results": [
                {"index": 0, "relevance_score": 0.2},
                {"index": 2, "relevance_score": 0.9},
                {"index": 1, "relevance_score": 0.5}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = RerankClient::new(
            Some(&server.uri()),
            Some("key"),
            Some("rerank-model"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(client.is_enabled());

        let order = client
            .rerank("q", &docs(&["a", "b", "c"]), 2)
            .await
            .unwrap();
        assert_eq!(order, vec![2, 1]);
    }

    #[tokio::test]
    async fn out_of_range_indices_dropped() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "results": [
                {"index": 7, "relevance_score": 1.0},
                {"index": 0, "relevance_score": 0.4}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = RerankClient::new(
            Some(&server.uri()),
            Some("key"),
            Some("rerank-model"),
            Duration::from_secs(5),
        )
        .unwrap();
        let order = client.rerank("q", &docs(&["a", "b"]), 5).await.unwrap();
        assert_eq!(order, vec![0]);
    }

    #[tokio::test]
    async fn upstream_failure_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = RerankClient::new(
            Some(&server.uri()),
            Some("key"),
            Some("rerank-model"),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.rerank("q", &docs(&["a"]), 1).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }
}
