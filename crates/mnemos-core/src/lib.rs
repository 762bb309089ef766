// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the Mnemos conversational agent.
//!
//! Holds the error taxonomy shared by every crate, the domain model
//! (sessions, turns, summaries, scheduled tasks), provider-neutral chat
//! types, the adapter traits for LLM / embedding / rerank providers, and
//! time utilities (epoch-second clock, zone-aware rendering, trigger
//! grammar parsing).

pub mod chat;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::Error;
pub use traits::{ChatProvider, Embedder, Reranker};
