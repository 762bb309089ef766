// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory subsystem: the live context window over the active
//! session, two-stage semantic retrieval over past sessions, and the
//! summariser that condenses turns and patches the long-term profile.

pub mod prompts;
pub mod retriever;
pub mod summarizer;
pub mod window;

pub use retriever::{RetrievalParams, RetrievedMemories, Retriever};
pub use summarizer::{SummarizerOutcome, Summarizer};
pub use window::ContextWindow;
