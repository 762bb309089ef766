// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-stage recall over past sessions.
//!
//! Stage one gathers summaries by embedding similarity for both the
//! user input and the most recent assistant turn; stage two gathers
//! turns from each retained summary's session. An optional reranker
//! prunes the candidates; without it, the best vector score wins with
//! recency as the tie-break. The active session never appears.

use std::collections::HashSet;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, warn};

use mnemos_core::time::human_time;
use mnemos_core::types::{Role, Summary, Turn};
use mnemos_core::{Embedder, Error, Reranker};
use mnemos_storage::Store;

/// Tuning knobs, typically sourced from configuration.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub recall_summary_per_query: usize,
    pub recall_conv_per_summary: usize,
    pub rerank_top_summaries: usize,
    pub rerank_top_convs: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        RetrievalParams {
            recall_summary_per_query: 3,
            recall_conv_per_summary: 4,
            rerank_top_summaries: 3,
            rerank_top_convs: 6,
        }
    }
}

/// A recalled summary, annotated for prompt rendering.
#[derive(Debug, Clone)]
pub struct RetrievedSummary {
    pub text: String,
    /// Local-time range the summary covers, e.g. "2026-01-03 10:00:00 ~
    /// 2026-01-03 11:30:00".
    pub human_time: String,
}

/// A recalled turn, annotated for prompt rendering.
#[derive(Debug, Clone)]
pub struct RetrievedTurn {
    pub role: Role,
    pub text: String,
    pub human_time: String,
}

/// The retriever's output for one user turn.
#[derive(Debug, Clone, Default)]
pub struct RetrievedMemories {
    pub summaries: Vec<RetrievedSummary>,
    pub turns: Vec<RetrievedTurn>,
}

impl RetrievedMemories {
    fn default_empty() -> Self {
        RetrievedMemories::default()
    }

    /// Render summaries as prompt lines: `[range] text`.
    pub fn summary_lines(&self) -> Vec<String> {
        self.summaries
            .iter()
            .map(|s| format!("[{}] {}", s.human_time, s.text))
            .collect()
    }

    /// Render turns as prompt lines: `[time] Role: text`.
    pub fn turn_lines(&self) -> Vec<String> {
        self.turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("[{}] {}: {}", t.human_time, role, t.text)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.turns.is_empty()
    }
}

/// Two-stage recall with optional reranking.
pub struct Retriever {
    store: Store,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    params: RetrievalParams,
    tz: Tz,
}

impl Retriever {
    pub fn new(
        store: Store,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        params: RetrievalParams,
        tz: Tz,
    ) -> Retriever {
        Retriever {
            store,
            embedder,
            reranker,
            params,
            tz,
        }
    }

    /// Retrieve memories relevant to the current input.
    ///
    /// `exclude_summary_ids` are the window's recent summaries, already
    /// visible in the prompt. Embedder failure degrades to an empty
    /// result; reranker failure degrades to vector-score ordering.
    pub async fn retrieve(
        &self,
        user_input: &str,
        last_assistant: Option<&str>,
        active_session: i64,
        exclude_summary_ids: &[i64],
    ) -> RetrievedMemories {
        let query_vec = match self.embedder.embed(user_input).await {
            Ok(vec) => vec,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "embedder failed, skipping retrieval");
                return RetrievedMemories::default_empty();
            }
        };

        match self
            .retrieve_inner(user_input, &query_vec, last_assistant, active_session, exclude_summary_ids)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "retrieval failed, returning nothing");
                RetrievedMemories::default_empty()
            }
        }
    }

    async fn retrieve_inner(
        &self,
        user_input: &str,
        query_vec: &[f32],
        last_assistant: Option<&str>,
        active_session: i64,
        exclude_summary_ids: &[i64],
    ) -> Result<RetrievedMemories, Error> {
        // Stage one: summary candidates from both query vectors,
        // deduplicated by id with the best score retained.
        let mut candidates: Vec<(Summary, f32)> = self
            .store
            .vector_search_summaries(
                query_vec,
                self.params.recall_summary_per_query,
                Some(active_session),
                exclude_summary_ids,
            )
            .await?;

        if let Some(assistant_text) = last_assistant {
            // The embedder's cache makes the repeat embedding free
            // while the assistant turn is unchanged.
            match self.embedder.embed(assistant_text).await {
                Ok(assistant_vec) => {
                    let more = self
                        .store
                        .vector_search_summaries(
                            &assistant_vec,
                            self.params.recall_summary_per_query,
                            Some(active_session),
                            exclude_summary_ids,
                        )
                        .await?;
                    let seen: HashSet<i64> =
                        candidates.iter().map(|(s, _)| s.summary_id).collect();
                    candidates.extend(
                        more.into_iter().filter(|(s, _)| !seen.contains(&s.summary_id)),
                    );
                }
                Err(e) => {
                    warn!(error = %e, "assistant-turn embedding failed, single-query recall");
                }
            }
        }

        // Stage two: turns from each retained summary's session.
        let mut turn_candidates: Vec<(Turn, f32)> = Vec::new();
        let mut seen_turns = HashSet::new();
        for (summary, _) in &candidates {
            let turns = self
                .store
                .vector_search_turns(
                    query_vec,
                    self.params.recall_conv_per_summary,
                    summary.session_id,
                )
                .await?;
            for (turn, score) in turns {
                if seen_turns.insert(turn.turn_id) {
                    turn_candidates.push((turn, score));
                }
            }
        }

        let (summaries, turns) = if self.reranker.is_enabled() && !candidates.is_empty() {
            self.rerank_candidates(user_input, candidates, turn_candidates)
                .await
        } else {
            (
                keep_top(candidates, self.params.rerank_top_summaries, |s| s.last_ts),
                keep_top(turn_candidates, self.params.rerank_top_convs, |t| t.ts),
            )
        };

        debug!(
            summaries = summaries.len(),
            turns = turns.len(),
            "retrieval complete"
        );

        Ok(RetrievedMemories {
            summaries: summaries
                .into_iter()
                .map(|s| self.annotate_summary(&s))
                .collect(),
            turns: turns.into_iter().map(|t| self.annotate_turn(&t)).collect(),
        })
    }

    /// Prune both candidate sets via the reranker, falling back to
    /// vector-score ordering on any rerank failure.
    async fn rerank_candidates(
        &self,
        query: &str,
        summaries: Vec<(Summary, f32)>,
        turns: Vec<(Turn, f32)>,
    ) -> (Vec<Summary>, Vec<Turn>) {
        let summary_docs: Vec<String> =
            summaries.iter().map(|(s, _)| s.text.clone()).collect();
        let kept_summaries = match self
            .reranker
            .rerank(query, &summary_docs, self.params.rerank_top_summaries)
            .await
        {
            Ok(order) => order
                .into_iter()
                .filter_map(|i| summaries.get(i).map(|(s, _)| s.clone()))
                .collect(),
            Err(e) => {
                warn!(error = %e, "summary rerank failed, using vector order");
                keep_top(summaries, self.params.rerank_top_summaries, |s| s.last_ts)
            }
        };

        if turns.is_empty() {
            return (kept_summaries, Vec::new());
        }
        let turn_docs: Vec<String> = turns.iter().map(|(t, _)| t.text.clone()).collect();
        let kept_turns = match self
            .reranker
            .rerank(query, &turn_docs, self.params.rerank_top_convs)
            .await
        {
            Ok(order) => order
                .into_iter()
                .filter_map(|i| turns.get(i).map(|(t, _)| t.clone()))
                .collect(),
            Err(e) => {
                warn!(error = %e, "turn rerank failed, using vector order");
                keep_top(turns, self.params.rerank_top_convs, |t| t.ts)
            }
        };
        (kept_summaries, kept_turns)
    }

    fn annotate_summary(&self, summary: &Summary) -> RetrievedSummary {
        let start = human_time(summary.first_ts, self.tz);
        let end = human_time(summary.last_ts, self.tz);
        let human_time = if start == end {
            start
        } else {
            format!("{start} ~ {end}")
        };
        RetrievedSummary {
            text: summary.text.clone(),
            human_time,
        }
    }

    fn annotate_turn(&self, turn: &Turn) -> RetrievedTurn {
        RetrievedTurn {
            role: turn.role,
            text: turn.text.clone(),
            human_time: human_time(turn.ts, self.tz),
        }
    }
}

/// Order by score descending (recency breaks ties) and truncate.
fn keep_top<T: Clone>(
    mut scored: Vec<(T, f32)>,
    n: usize,
    ts_of: impl Fn(&T) -> i64,
) -> Vec<T> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ts_of(&b.0).cmp(&ts_of(&a.0)))
    });
    scored.truncate(n);
    scored.into_iter().map(|(item, _)| item).collect()
}
