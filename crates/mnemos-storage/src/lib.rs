// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Mnemos agent.
//!
//! One database file holds sessions, turns, summaries, the vector
//! sidecars (f32 BLOB embeddings, one row per turn/summary), the FTS5
//! shadow tables kept in sync by triggers, and scheduled tasks. All
//! writes are serialized through tokio-rusqlite's single background
//! thread; do NOT create additional connections for writes.

pub mod database;
pub mod queries;
pub mod schema;
pub mod vector;

pub use database::Store;
pub use queries::search::{validate_fts_query, SearchFilter};
