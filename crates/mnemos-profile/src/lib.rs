// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The long-term profile: a structured JSON document describing bot
//! persona and user model, embedded verbatim in every prompt.
//!
//! The in-memory cache is authoritative; disk writes are atomic
//! (temp file + rename) and synchronous with cache updates.

pub mod document;
pub mod store;

pub use document::ProfileDocument;
pub use store::ProfileStore;
