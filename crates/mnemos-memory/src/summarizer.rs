// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The summariser: one tool-model call condenses a slice of turns into
//! a prose summary and a JSON Patch against the profile document.
//!
//! A failed patch is discarded (the summary is still kept); a failed
//! LLM call or unparsable response propagates so the caller leaves the
//! window untouched and retries at the next trigger crossing.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{info, warn};

use mnemos_core::chat::{ChatMessage, ChatRequest};
use mnemos_core::time::human_time;
use mnemos_core::types::Turn;
use mnemos_core::{ChatProvider, Embedder, Error};
use mnemos_profile::ProfileStore;
use mnemos_storage::Store;

use crate::prompts::{clean_json_response, summarize_prompt, SUMMARIZER_SYSTEM_PROMPT};

/// The strictly-typed response expected from the tool model.
#[derive(Debug, Deserialize)]
struct SummarizerResponse {
    summary: String,
    #[serde(default)]
    patch: serde_json::Value,
}

/// Result of a successful summarisation.
#[derive(Debug, Clone)]
pub struct SummarizerOutcome {
    pub summary_id: i64,
    pub summary_text: String,
    /// False when the model's patch was discarded as invalid.
    pub patch_applied: bool,
}

/// LLM-backed condensation of turn slices, with profile patching.
pub struct Summarizer {
    provider: Arc<dyn ChatProvider>,
    tool_model: String,
    store: Store,
    profile: Arc<ProfileStore>,
    embedder: Arc<dyn Embedder>,
    tz: Tz,
}

impl Summarizer {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tool_model: impl Into<String>,
        store: Store,
        profile: Arc<ProfileStore>,
        embedder: Arc<dyn Embedder>,
        tz: Tz,
    ) -> Summarizer {
        Summarizer {
            provider,
            tool_model: tool_model.into(),
            store,
            profile,
            embedder,
            tz,
        }
    }

    /// Condense `turns` into a stored summary and apply the profile
    /// patch. The turns must be non-empty and belong to `session_id`.
    ///
    /// No tools are ever advertised on this call, so the model cannot
    /// query its own memory while it is being condensed.
    pub async fn summarize(
        &self,
        session_id: i64,
        turns: &[Turn],
    ) -> Result<SummarizerOutcome, Error> {
        if turns.is_empty() {
            return Err(Error::BadArgument("nothing to summarise".into()));
        }

        let first_ts = turns.first().map(|t| t.ts).unwrap_or_default();
        let last_ts = turns.last().map(|t| t.ts).unwrap_or_default();
        let time_range = format!(
            "between {} and {}",
            human_time(first_ts, self.tz),
            human_time(last_ts, self.tz)
        );

        let profile_json = self.profile.snapshot().to_pretty_json();
        let request = ChatRequest {
            model: self.tool_model.clone(),
            messages: vec![
                ChatMessage::system(SUMMARIZER_SYSTEM_PROMPT),
                ChatMessage::user(summarize_prompt(turns, &profile_json, &time_range)),
            ],
            tools: Vec::new(),
        };

        let response = self.provider.complete(request).await?;
        let parsed: SummarizerResponse =
            serde_json::from_str(clean_json_response(&response.content)).map_err(|e| {
                Error::upstream(format!("summariser returned malformed response: {e}"))
            })?;
        if parsed.summary.trim().is_empty() {
            return Err(Error::upstream("summariser returned an empty summary"));
        }

        let summary_id = self
            .store
            .insert_summary(session_id, parsed.summary.trim(), first_ts, last_ts)
            .await?;

        // Embedding is a side effect; a missing vector only means this
        // summary is invisible to vector recall until re-embedded.
        match self.embedder.embed(parsed.summary.trim()).await {
            Ok(vec) => {
                if let Err(e) = self.store.attach_summary_vector(summary_id, &vec).await {
                    warn!(summary_id, error = %e, "failed to attach summary vector");
                }
            }
            Err(e) => {
                warn!(summary_id, error = %e, kind = e.kind(), "summary embedding failed");
            }
        }

        let patch_applied = self.apply_profile_patch(summary_id, &parsed.patch);

        info!(
            summary_id,
            session_id,
            turns = turns.len(),
            patch_applied,
            "turns summarised"
        );

        Ok(SummarizerOutcome {
            summary_id,
            summary_text: parsed.summary.trim().to_string(),
            patch_applied,
        })
    }

    fn apply_profile_patch(&self, summary_id: i64, patch: &serde_json::Value) -> bool {
        let is_empty = match patch {
            serde_json::Value::Array(ops) => ops.is_empty(),
            serde_json::Value::Null => true,
            _ => false,
        };
        if is_empty {
            return false;
        }
        match self.profile.apply_patch(patch) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    summary_id,
                    error = %e,
                    kind = e.kind(),
                    "profile patch discarded"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mnemos_core::chat::ChatResponse;
    use mnemos_core::types::Role;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Tool-model stub returning a canned response body.
    struct CannedProvider {
        body: Mutex<String>,
    }

    impl CannedProvider {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(CannedProvider {
                body: Mutex::new(body.to_string()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for CannedProvider {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
            // The summariser must never advertise tools.
            assert!(request.tools.is_empty());
            Ok(ChatResponse {
                content: self.body.lock().unwrap().clone(),
                tool_calls: Vec::new(),
            })
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
            Err(Error::upstream("embedder down"))
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    async fn harness(
        body: &str,
        embedder: Arc<dyn Embedder>,
    ) -> (Summarizer, Store, Arc<ProfileStore>, tempfile::TempDir, i64) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db"), 4).await.unwrap();
        let session = store.create_session(0).await.unwrap();
        let profile = Arc::new(ProfileStore::open(&dir.path().join("seele.json")).unwrap());
        let summarizer = Summarizer::new(
            CannedProvider::new(body),
            "tool-model",
            store.clone(),
            profile.clone(),
            embedder,
            chrono_tz::UTC,
        );
        (summarizer, store, profile, dir, session)
    }

    fn turns(session: i64) -> Vec<Turn> {
        vec![
            Turn {
                turn_id: 1,
                session_id: session,
                ts: 100,
                role: Role::User,
                text: "my name is Anna".into(),
            },
            Turn {
                turn_id: 2,
                session_id: session,
                ts: 110,
                role: Role::Assistant,
                text: "nice to meet you, Anna".into(),
            },
        ]
    }

    #[tokio::test]
    async fn stores_summary_with_vector_and_applies_patch() {
        let body = r#"{"summary": "Anna introduced herself.",
                       "patch": [{"op": "replace", "path": "/user/name", "value": "Anna"}]}"#;
        let (summarizer, store, profile, _dir, session) =
            harness(body, Arc::new(UnitEmbedder)).await;

        let outcome = summarizer.summarize(session, &turns(session)).await.unwrap();
        assert!(outcome.patch_applied);
        assert_eq!(outcome.summary_text, "Anna introduced herself.");

        let stored = store.summary_by_id(outcome.summary_id).await.unwrap().unwrap();
        assert_eq!(stored.first_ts, 100);
        assert_eq!(stored.last_ts, 110);

        // Vector attached: the summary is visible to vector recall.
        let hits = store
            .vector_search_summaries(&[1.0, 0.0, 0.0, 0.0], 5, None, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // Cache freshness: the very next snapshot sees the patch.
        assert_eq!(profile.snapshot().user.name, "Anna");
    }

    #[tokio::test]
    async fn fenced_response_is_accepted() {
        let body = "```json\n{\"summary\": \"fenced\", \"patch\": []}\n```";
        let (summarizer, _store, _profile, _dir, session) =
            harness(body, Arc::new(UnitEmbedder)).await;
        let outcome = summarizer.summarize(session, &turns(session)).await.unwrap();
        assert_eq!(outcome.summary_text, "fenced");
        assert!(!outcome.patch_applied);
    }

    #[tokio::test]
    async fn invalid_patch_is_discarded_but_summary_kept() {
        let body = r#"{"summary": "kept anyway",
                       "patch": [{"op": "remove", "path": "/user/not_a_field"}]}"#;
        let (summarizer, store, profile, _dir, session) =
            harness(body, Arc::new(UnitEmbedder)).await;

        let outcome = summarizer.summarize(session, &turns(session)).await.unwrap();
        assert!(!outcome.patch_applied);
        assert!(store
            .summary_by_id(outcome.summary_id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(profile.snapshot(), Default::default());
    }

    #[tokio::test]
    async fn malformed_response_propagates_upstream_failure() {
        let (summarizer, store, _profile, _dir, session) =
            harness("this is not json at all", Arc::new(UnitEmbedder)).await;
        let err = summarizer
            .summarize(session, &turns(session))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
        // Nothing persisted.
        assert!(store.recent_summaries(session, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedder_outage_keeps_summary_without_vector() {
        let body = r#"{"summary": "no vector today", "patch": []}"#;
        let (summarizer, store, _profile, _dir, session) =
            harness(body, Arc::new(FailingEmbedder)).await;

        let outcome = summarizer.summarize(session, &turns(session)).await.unwrap();
        assert!(store
            .summary_by_id(outcome.summary_id)
            .await
            .unwrap()
            .is_some());
        // Invisible to vector recall, present for FTS.
        let hits = store
            .vector_search_summaries(&[1.0, 0.0, 0.0, 0.0], 5, None, &[])
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_slice_rejected() {
        let body = r#"{"summary": "s", "patch": []}"#;
        let (summarizer, _store, _profile, _dir, session) =
            harness(body, Arc::new(UnitEmbedder)).await;
        let err = summarizer.summarize(session, &[]).await.unwrap_err();
        assert_eq!(err.kind(), "bad_argument");
    }
}
