// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-completion client.
//!
//! One client instance serves both the conversation model and the tool
//! model; the model identifier travels in the request. Transient errors
//! (429, 500, 503) are retried once after a short delay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, warn};

use mnemos_core::chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ToolCall};
use mnemos_core::{ChatProvider, Error};

use crate::types::{
    ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, WireFunction,
    WireFunctionCall, WireMessage, WireTool, WireToolCall,
};

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl ChatClient {
    /// Creates a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| Error::BadArgument(format!("invalid API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::UpstreamFailure {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(ChatClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries: 1,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<ChatCompletionResponse, Error> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying chat request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(self.endpoint())
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        Error::Timeout {
                            duration: self.timeout,
                        }
                    } else {
                        Error::UpstreamFailure {
                            message: format!("chat request failed: {e}"),
                            source: Some(Box::new(e)),
                        }
                    }
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "chat response received");

            if status.is_success() {
                return response.json().await.map_err(|e| Error::UpstreamFailure {
                    message: format!("failed to parse chat response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let text = response.text().await.unwrap_or_default();
            if is_transient(status) && attempt < self.max_retries {
                last_error = Some(Error::upstream(format!("chat API returned {status}: {text}")));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(err) => format!(
                    "chat API error ({}): {}",
                    err.error.type_.unwrap_or_else(|| status.to_string()),
                    err.error.message
                ),
                Err(_) => format!("chat API returned {status}: {text}"),
            };
            return Err(Error::upstream(message));
        }

        Err(last_error.unwrap_or_else(|| Error::upstream("chat request failed after retries")))
    }
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

fn to_wire(message: &ChatMessage) -> WireMessage {
    let role = match message.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    };
    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    call_type: "function".into(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        )
    };
    WireMessage {
        role: role.into(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|spec| WireTool {
                        tool_type: "function".into(),
                        function: WireFunction {
                            name: spec.name.clone(),
                            description: spec.description.clone(),
                            parameters: spec.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(to_wire).collect(),
            tools,
        };

        let response = self.send(&body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("chat API returned no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}
