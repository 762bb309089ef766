// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared across all Mnemos crates.
//!
//! Every variant carries a stable `kind()` key so tests and log
//! consumers can assert on the kind rather than message text.

use thiserror::Error;

/// The primary error type used across storage, clients, tools, and the
/// orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an argument the operation cannot accept
    /// (unparsable trigger time, unknown action, bad timezone).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// A full-text query failed validation (unbalanced quotes or
    /// parentheses, operator at an edge) or was rejected by FTS5.
    #[error("bad query: {0}")]
    BadQuery(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or schema mismatch, including opening a store whose
    /// declared embedding dimension or schema version differs.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage backend failed (connection, query, serialization).
    #[error("store unavailable: {source}")]
    StoreUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An outbound network call exceeded its configured deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// An upstream service (LLM, embedder, reranker, tool server)
    /// returned a failure.
    #[error("upstream failure: {message}")]
    UpstreamFailure {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The tool is disabled in the current call context.
    #[error("policy violation: {0}")]
    PolicyViolation(String),
}

impl Error {
    /// Stable taxonomy key for this error, independent of message text.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BadArgument(_) => "bad_argument",
            Error::BadQuery(_) => "bad_query",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::Timeout { .. } => "timeout",
            Error::UpstreamFailure { .. } => "upstream_failure",
            Error::PolicyViolation(_) => "policy_violation",
        }
    }

    /// Shorthand for an upstream failure without a source error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Error::UpstreamFailure {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_keys_are_stable() {
        assert_eq!(Error::BadArgument("x".into()).kind(), "bad_argument");
        assert_eq!(Error::BadQuery("x".into()).kind(), "bad_query");
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(Error::Conflict("x".into()).kind(), "conflict");
        assert_eq!(
            Error::Timeout {
                duration: std::time::Duration::from_secs(5)
            }
            .kind(),
            "timeout"
        );
        assert_eq!(Error::upstream("x").kind(), "upstream_failure");
        assert_eq!(Error::PolicyViolation("x".into()).kind(), "policy_violation");
    }

    #[test]
    fn display_includes_message() {
        let err = Error::BadQuery("unbalanced quotes".into());
        assert!(err.to_string().contains("unbalanced quotes"));
    }
}
