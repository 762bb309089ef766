// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for the external model services.
//!
//! The agent crates depend on these seams rather than concrete HTTP
//! clients, so tests can substitute deterministic implementations.

use async_trait::async_trait;

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::Error;

/// A chat-completion provider (chat model or tool model).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends one completion request and returns the full response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, Error>;
}

/// Turns text into a fixed-dimension embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// The deployment-fixed dimension D every vector must have.
    fn dimension(&self) -> usize;
}

/// Scores (query, candidate) pairs via an external rerank service.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// False when the reranker is not configured; callers fall back to
    /// vector-score ordering.
    fn is_enabled(&self) -> bool;

    /// Returns candidate indices in descending relevance order,
    /// truncated to `top_n`.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<usize>, Error>;
}
