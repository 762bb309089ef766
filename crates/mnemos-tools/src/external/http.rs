// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport: JSON-RPC requests POSTed to the server's URL.
//! `bearerToken` becomes an `Authorization` header; extra headers pass
//! through verbatim. Covers both the STREAMABLE_HTTP and SSE entries of
//! the config (responses are read as single JSON bodies).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tracing::debug;

use mnemos_core::Error;

use super::config::HttpServerConfig;
use super::rpc::{
    parse_call_result, parse_tool_list, rpc_error, RpcRequest, RpcResponse, ToolDescriptor,
};
use super::ToolServer;

pub struct HttpServer {
    name: String,
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    tools: Vec<ToolDescriptor>,
}

impl HttpServer {
    /// Build the client, run the handshake, and cache the tool list.
    pub async fn connect(name: &str, config: HttpServerConfig) -> Result<HttpServer, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::BadArgument(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (key, value) in &config.headers {
            let header_name = key
                .parse::<HeaderName>()
                .map_err(|e| Error::BadArgument(format!("invalid header name '{key}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::BadArgument(format!("invalid header value for '{key}': {e}")))?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::UpstreamFailure {
                message: format!("failed to build HTTP client for '{name}': {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut server = HttpServer {
            name: name.to_string(),
            client,
            url: config.url.clone(),
            next_id: AtomicU64::new(1),
            tools: Vec::new(),
        };

        let id = server.next_id.fetch_add(1, Ordering::SeqCst);
        server.roundtrip(RpcRequest::initialize(id)).await?;

        let id = server.next_id.fetch_add(1, Ordering::SeqCst);
        let result = server
            .roundtrip(RpcRequest::new(id, "tools/list", None))
            .await?;
        server.tools = parse_tool_list(&result)?;
        debug!(server = name, tools = server.tools.len(), "http server ready");

        Ok(server)
    }

    async fn roundtrip(&self, request: RpcRequest) -> Result<serde_json::Value, Error> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamFailure {
                message: format!("tool server '{}' request failed: {e}", self.name),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "tool server '{}' returned {status}: {text}",
                self.name
            )));
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| Error::UpstreamFailure {
            message: format!("tool server '{}' sent invalid JSON: {e}", self.name),
            source: Some(Box::new(e)),
        })?;
        if let Some(error) = parsed.error {
            return Err(rpc_error(&self.name, error));
        }
        parsed.result.ok_or_else(|| {
            Error::upstream(format!("tool server '{}' sent an empty result", self.name))
        })
    }
}

#[async_trait]
impl ToolServer for HttpServer {
    fn server_name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call(&self, tool: &str, args: serde_json::Value) -> Result<String, Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let result = self
            .roundtrip(RpcRequest::new(
                id,
                "tools/call",
                Some(serde_json::json!({"name": tool, "arguments": args})),
            ))
            .await?;
        Ok(parse_call_result(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> HttpServerConfig {
        HttpServerConfig {
            transport: "STREAMABLE_HTTP".into(),
            url: url.to_string(),
            bearer_token: Some("tok".into()),
            headers: Default::default(),
        }
    }

    async fn mount_handshake(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"method": "initialize"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "result": {"protocolVersion": "2024-11-05"}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2,
                "result": {"tools": [{"name": "fetch_page", "description": "fetches",
                                      "inputSchema": {"type": "object"}}]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn connect_caches_tool_schemas() {
        let mock = MockServer::start().await;
        mount_handshake(&mock).await;

        let server = HttpServer::connect("web", config(&mock.uri())).await.unwrap();
        assert_eq!(server.tools().len(), 1);
        assert_eq!(server.tools()[0].name, "fetch_page");
    }

    #[tokio::test]
    async fn call_forwards_arguments_and_returns_text() {
        let mock = MockServer::start().await;
        mount_handshake(&mock).await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(serde_json::json!({
                "method": "tools/call",
                "params": {"name": "fetch_page", "arguments": {"url": "https://x"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 3,
                "result": {"content": [{"type": "text", "text": "page body"}]}
            })))
            .mount(&mock)
            .await;

        let server = HttpServer::connect("web", config(&mock.uri())).await.unwrap();
        let result = server
            .call("fetch_page", serde_json::json!({"url": "https://x"}))
            .await
            .unwrap();
        assert_eq!(result, "page body");
    }

    #[tokio::test]
    async fn rpc_error_surfaces_as_upstream_failure() {
        let mock = MockServer::start().await;
        mount_handshake(&mock).await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"method": "tools/call"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 3,
                "error": {"code": -32000, "message": "backend exploded"}
            })))
            .mount(&mock)
            .await;

        let server = HttpServer::connect("web", config(&mock.uri())).await.unwrap();
        let err = server
            .call("fetch_page", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
        assert!(err.to_string().contains("backend exploded"));
    }
}
