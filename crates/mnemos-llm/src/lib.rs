// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP clients for the external model services.
//!
//! All three clients speak OpenAI-compatible endpoints
//! (`/chat/completions`, `/embeddings`, `/rerank`), retry once on
//! transient status codes, and map deadline overruns to
//! `Error::Timeout`. The rerank client is optional and degrades
//! gracefully when unconfigured.

pub mod chat;
pub mod embedding;
pub mod rerank;
pub mod types;

pub use chat::ChatClient;
pub use embedding::EmbeddingClient;
pub use rerank::RerankClient;
